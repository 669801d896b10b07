//! Motor de alertas por transiciones.
//!
//! Máquina de estados por clase de alerta con estados inactiva, activa y
//! despejada.
//!
//! # Comportamiento
//! * Transición a activa cuando el predicado de la clase pasa a verdadero.
//! * Transición a despejada cuando el predicado vuelve a falso.
//! * Reentrar a activa crea una alerta con id nuevo, nunca se resucita una
//!   alerta despejada.
//! * Si la severidad calculada de una clase activa cambia, la alerta vigente
//!   se reemplaza por una nueva con id propio y la anterior queda despejada.


use tracing::info;
use crate::alerts::domain::{Alert, AlertClass, Severity};


/// Tablero de alertas del servicio.
///
/// Mantiene a lo sumo una alerta activa por clase y asigna ids crecientes
/// por cada activación.
#[derive(Debug, Clone)]
pub struct AlertBoard {
    next_id: u64,
    active: Vec<Alert>,
}


impl AlertBoard {

    pub fn new() -> AlertBoard {
        AlertBoard {
            next_id: 1,
            active: Vec::new(),
        }
    }

    /// Marca la condición de la clase como activa.
    ///
    /// # Comportamiento
    /// * Sin alerta activa de la clase: crea una nueva con id propio.
    /// * Con alerta activa de igual severidad: conserva id y `raised_at_ms`
    ///   y refresca el mensaje con el valor más reciente.
    /// * Con alerta activa de otra severidad: la despeja y crea una nueva.
    pub fn raise(&mut self, class: AlertClass, severity: Severity, message: String, now_ms: i64) {
        match self.active.iter().position(|alert| alert.class == class) {
            None => {
                let alert = self.activate(class, severity, message, now_ms);
                info!("Info: alerta activada {:?} con severidad {:?}", alert.class, alert.severity);
                self.active.push(alert);
            }
            Some(index) => {
                if self.active[index].severity == severity {
                    self.active[index].message = message;
                } else {
                    let mut superseded = self.active.remove(index);
                    superseded.cleared_at_ms = Some(now_ms);
                    info!("Info: alerta {:?} reemplazada, severidad {:?} pasa a {:?}",
                          superseded.class, superseded.severity, severity);
                    let alert = self.activate(class, severity, message, now_ms);
                    self.active.push(alert);
                }
            }
        }
    }

    /// Despeja la alerta activa de la clase, si existe.
    pub fn clear(&mut self, class: &AlertClass, now_ms: i64) {
        if let Some(index) = self.active.iter().position(|alert| alert.class == *class) {
            let mut cleared = self.active.remove(index);
            cleared.cleared_at_ms = Some(now_ms);
            info!("Info: alerta despejada {:?}", cleared.class);
        }
    }

    /// Alertas activas en orden de presentación.
    ///
    /// # Retorno
    /// * Severidad descendente y, dentro de cada severidad, la más reciente
    ///   primero.
    pub fn active_sorted(&self) -> Vec<Alert> {
        let mut list = self.active.clone();
        list.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then(b.raised_at_ms.cmp(&a.raised_at_ms))
        });
        list
    }

    fn activate(&mut self, class: AlertClass, severity: Severity, message: String, now_ms: i64) -> Alert {
        let id = self.next_id;
        self.next_id += 1;
        Alert {
            id,
            class,
            severity,
            message,
            raised_at_ms: now_ms,
            cleared_at_ms: None,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::domain::Metric;

    #[test]
    fn condicion_persistente_mantiene_una_sola_alerta() {
        let mut board = AlertBoard::new();
        let class = AlertClass::OverLimit(Metric::ParticleCount);
        board.raise(class.clone(), Severity::Warning, "1520 > 500".to_string(), 10);
        board.raise(class.clone(), Severity::Warning, "1600 > 500".to_string(), 20);

        let active = board.active_sorted();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, 1);
        assert_eq!(active[0].raised_at_ms, 10);
        // El mensaje refleja el valor más reciente
        assert_eq!(active[0].message, "1600 > 500");
    }

    #[test]
    fn reentrada_tras_despeje_emite_id_nuevo() {
        let mut board = AlertBoard::new();
        let class = AlertClass::OverLimit(Metric::ParticleCount);
        board.raise(class.clone(), Severity::Warning, "fuera".to_string(), 10);
        board.clear(&class, 20);
        assert!(board.active_sorted().is_empty());

        board.raise(class.clone(), Severity::Warning, "fuera otra vez".to_string(), 30);
        let active = board.active_sorted();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, 2);
        assert_eq!(active[0].raised_at_ms, 30);
    }

    #[test]
    fn cambio_de_severidad_reemplaza_la_alerta() {
        let mut board = AlertBoard::new();
        let class = AlertClass::OverLimit(Metric::ParticleCount);
        board.raise(class.clone(), Severity::Warning, "800 > 500".to_string(), 10);
        board.raise(class.clone(), Severity::Critical, "1600 > 500".to_string(), 20);

        let active = board.active_sorted();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, 2);
        assert_eq!(active[0].severity, Severity::Critical);
        assert_eq!(active[0].raised_at_ms, 20);
    }

    #[test]
    fn clases_distintas_no_se_enmascaran() {
        let mut board = AlertBoard::new();
        board.raise(AlertClass::OverLimit(Metric::ParticleCount), Severity::Warning, "a".to_string(), 10);
        board.raise(AlertClass::OverLimit(Metric::Turbidity), Severity::Warning, "b".to_string(), 20);
        board.raise(AlertClass::DeviceFault("pump-filtration".to_string()), Severity::Critical, "c".to_string(), 30);
        assert_eq!(board.active_sorted().len(), 3);
    }

    #[test]
    fn orden_de_presentacion_por_severidad_y_recencia() {
        let mut board = AlertBoard::new();
        board.raise(AlertClass::CycleComplete, Severity::Info, "ciclo".to_string(), 40);
        board.raise(AlertClass::OverLimit(Metric::ParticleCount), Severity::Warning, "exceso".to_string(), 10);
        board.raise(AlertClass::FeedLoss, Severity::Critical, "sin señal".to_string(), 20);
        board.raise(AlertClass::DeviceFault("valve-intake".to_string()), Severity::Critical, "falla".to_string(), 30);

        let active = board.active_sorted();
        let order: Vec<(Severity, i64)> = active.iter().map(|a| (a.severity, a.raised_at_ms)).collect();
        assert_eq!(order, vec![
            (Severity::Critical, 30),
            (Severity::Critical, 20),
            (Severity::Warning, 10),
            (Severity::Info, 40),
        ]);
    }

    #[test]
    fn despejar_una_clase_inactiva_no_hace_nada() {
        let mut board = AlertBoard::new();
        board.clear(&AlertClass::FeedLoss, 10);
        assert!(board.active_sorted().is_empty());
    }
}
