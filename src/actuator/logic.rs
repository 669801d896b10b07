//! Pasarela de control de actuadores.
//!
//! Este módulo implementa el ciclo comando/confirmación de los actuadores.
//!
//! # Flujo de Trabajo
//! 1. `apply` mueve el estado comandado de inmediato (actualización
//!    optimista), registra el comando pendiente y devuelve el comando a
//!    despachar hacia la capa de dispositivos.
//! 2. `confirm` reconcilia el estado confirmado con el reporte del
//!    dispositivo: coincidencia con el pendiente lo cierra, contradicción
//!    revierte el comandado, un token ajeno se trata como telemetría no
//!    solicitada.
//! 3. `expire_deadlines` corre en cada tick: un pendiente vencido deja el
//!    confirmado en `Unknown` y se reporta como falla de dispositivo, nunca
//!    se reintenta el comando.
//!
//! `ControlHandle` es la fachada clonable que usa la capa de vistas para
//! entrar al camino único de mutación del almacén.


use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use crate::actuator::domain::{ActuatorKind, ActuatorState, CommandToken, ConfirmOutcome,
                              ConfirmedState, DeviceCommand, PendingCommand, SwitchState};
use crate::store::domain::{ControlRequest, Reading, StoreError};


struct Slot {
    state: ActuatorState,
    pending: Option<PendingCommand>,
}


/// Inventario de actuadores y su registro de comandos pendientes.
///
/// Propiedad exclusiva del almacén de monitoreo; toda mutación entra por el
/// camino serializado de su tarea.
pub struct ActuatorPanel {
    slots: Vec<Slot>,
    next_token: u64,
}


impl ActuatorPanel {

    /// Crea el panel a partir del inventario fijo del despliegue.
    ///
    /// Todos los actuadores arrancan comandados en `Off` y confirmados en
    /// `Unknown` hasta el primer reporte del dispositivo.
    pub fn new(inventory: &[(&str, ActuatorKind)], now_ms: i64) -> ActuatorPanel {
        let slots = inventory
            .iter()
            .map(|(id, kind)| Slot {
                state: ActuatorState {
                    id: id.to_string(),
                    kind: *kind,
                    commanded: SwitchState::Off,
                    confirmed: ConfirmedState::Unknown,
                    last_changed_ms: now_ms,
                },
                pending: None,
            })
            .collect();
        ActuatorPanel {
            slots,
            next_token: 1,
        }
    }

    /// Emite un comando con actualización optimista del estado comandado.
    ///
    /// # Retorno
    /// * El token del comando y el mensaje a despachar al dispositivo.
    /// * `Err(StoreError::UnknownActuator)` si el id no pertenece al
    ///   inventario.
    pub fn apply(&mut self,
                 id: &str,
                 desired: SwitchState,
                 now_ms: i64) -> Result<(CommandToken, DeviceCommand), StoreError> {

        let index = self.index_of(id)?;
        let token = self.allocate_token();
        let slot = &mut self.slots[index];

        if let Some(previous) = slot.pending.take() {
            warn!("Warning: comando pendiente {} sobre {} reemplazado por uno nuevo",
                  previous.token.0, id);
        }
        if slot.state.commanded != desired {
            slot.state.commanded = desired;
            slot.state.last_changed_ms = now_ms;
        }
        slot.pending = Some(PendingCommand {
            token,
            desired,
            issued_at_ms: now_ms,
        });
        Ok((token, DeviceCommand {
            actuator_id: slot.state.id.clone(),
            desired,
            token,
            priority: false,
        }))
    }

    /// Reconcilia el estado confirmado con un reporte del dispositivo.
    ///
    /// # Comportamiento
    /// * Token coincidente y estado igual al deseado: comando reconciliado.
    /// * Token coincidente y estado distinto: el comandado se revierte al
    ///   reportado y el comando queda cerrado.
    /// * Token obsoleto o ausente: telemetría no solicitada, sólo actualiza
    ///   el confirmado y el pendiente sigue armado.
    pub fn confirm(&mut self,
                   id: &str,
                   reported: SwitchState,
                   token: Option<CommandToken>,
                   now_ms: i64) -> Result<ConfirmOutcome, StoreError> {

        let index = self.index_of(id)?;
        let slot = &mut self.slots[index];
        let previous_confirmed = slot.state.confirmed;
        let mut outcome = ConfirmOutcome::default();

        match slot.pending.take() {
            Some(pending) if token == Some(pending.token) => {
                if reported == pending.desired {
                    outcome.reconciled = true;
                } else {
                    slot.state.commanded = reported;
                    outcome.rolled_back = true;
                }
            }
            other => {
                slot.pending = other;
                if token.is_some() {
                    // Token obsoleto: telemetría no solicitada
                    debug!("Debug: confirmación con token obsoleto para {}", id);
                }
            }
        }

        let confirmed = ConfirmedState::from(reported);
        if slot.state.confirmed != confirmed || outcome.rolled_back {
            slot.state.last_changed_ms = now_ms;
        }
        slot.state.confirmed = confirmed;

        if slot.state.kind == ActuatorKind::FiltrationUnit {
            if previous_confirmed == ConfirmedState::On && confirmed == ConfirmedState::Off {
                outcome.cycle_completed = true;
            }
            if previous_confirmed == ConfirmedState::Off && confirmed == ConfirmedState::On {
                outcome.cycle_started = true;
            }
        }
        Ok(outcome)
    }

    /// Vence los comandos pendientes que superaron el plazo.
    ///
    /// El actuador queda confirmado en `Unknown` y el comandado no se toca,
    /// el comando nunca se reintenta en silencio.
    ///
    /// # Retorno
    /// * Los ids de los actuadores cuyo comando venció en este tick.
    pub fn expire_deadlines(&mut self, now_ms: i64, timeout_ms: i64) -> Vec<String> {
        let mut expired = Vec::new();
        for slot in &mut self.slots {
            let timed_out = slot
                .pending
                .as_ref()
                .is_some_and(|pending| now_ms - pending.issued_at_ms >= timeout_ms);
            if timed_out {
                slot.pending = None;
                if slot.state.confirmed != ConfirmedState::Unknown {
                    slot.state.last_changed_ms = now_ms;
                }
                slot.state.confirmed = ConfirmedState::Unknown;
                expired.push(slot.state.id.clone());
            }
        }
        expired
    }

    /// Apagado de emergencia: fuerza el comandado de todo actuador
    /// encendido a `Off` en una sola pasada.
    ///
    /// Cuenta como encendido todo actuador comandado en `On` o confirmado
    /// en `On`, incluso si el encendido llegó como telemetría no solicitada
    /// sin comando previo. El comando lleva el estado deseado absoluto, no
    /// un toggle, por lo que reapagar lo ya apagándose es seguro.
    ///
    /// Los pendientes previos quedan reemplazados por el comando de apagado
    /// y la confirmación sigue siendo obligatoria: un apagado sin confirmar
    /// vence como cualquier otro comando y escala a falla de dispositivo.
    pub fn emergency_shutdown(&mut self, now_ms: i64) -> (Vec<CommandToken>, Vec<DeviceCommand>) {
        let mut tokens = Vec::new();
        let mut commands = Vec::new();
        for index in 0..self.slots.len() {
            let running = self.slots[index].state.commanded == SwitchState::On
                || self.slots[index].state.confirmed == ConfirmedState::On;
            if !running {
                continue;
            }
            let token = self.allocate_token();
            let slot = &mut self.slots[index];
            if let Some(previous) = slot.pending.take() {
                warn!("Warning: comando pendiente {} sobre {} reemplazado por apagado de emergencia",
                      previous.token.0, slot.state.id);
            }
            slot.state.commanded = SwitchState::Off;
            slot.state.last_changed_ms = now_ms;
            slot.pending = Some(PendingCommand {
                token,
                desired: SwitchState::Off,
                issued_at_ms: now_ms,
            });
            tokens.push(token);
            commands.push(DeviceCommand {
                actuator_id: slot.state.id.clone(),
                desired: SwitchState::Off,
                token,
                priority: true,
            });
        }
        (tokens, commands)
    }

    pub fn get(&self, id: &str) -> Option<&ActuatorState> {
        self.slots
            .iter()
            .map(|slot| &slot.state)
            .find(|state| state.id == id)
    }

    pub fn states(&self) -> Vec<ActuatorState> {
        self.slots.iter().map(|slot| slot.state.clone()).collect()
    }

    fn index_of(&self, id: &str) -> Result<usize, StoreError> {
        self.slots
            .iter()
            .position(|slot| slot.state.id == id)
            .ok_or(StoreError::UnknownActuator { id: id.to_string() })
    }

    fn allocate_token(&mut self) -> CommandToken {
        let token = CommandToken(self.next_token);
        self.next_token += 1;
        token
    }
}


/// Fachada clonable de control hacia la tarea del almacén.
///
/// Cada solicitud viaja por el canal de control con su `oneshot` de
/// respuesta, la capa de vistas nunca bloquea al almacén más allá de la
/// sección crítica de la mutación.
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlRequest>,
}


impl ControlHandle {

    pub fn new(tx: mpsc::Sender<ControlRequest>) -> ControlHandle {
        ControlHandle { tx }
    }

    pub async fn apply_actuator(&self,
                                actuator_id: &str,
                                desired: SwitchState) -> Result<CommandToken, StoreError> {
        let (reply, response) = oneshot::channel();
        let request = ControlRequest::Apply {
            actuator_id: actuator_id.to_string(),
            desired,
            reply,
        };
        self.tx.send(request).await.map_err(|_| StoreError::ChannelClosed)?;
        response.await.map_err(|_| StoreError::ChannelClosed)?
    }

    pub async fn emergency_shutdown(&self) -> Result<Vec<CommandToken>, StoreError> {
        let (reply, response) = oneshot::channel();
        let request = ControlRequest::EmergencyShutdown { reply };
        self.tx.send(request).await.map_err(|_| StoreError::ChannelClosed)?;
        response.await.map_err(|_| StoreError::ChannelClosed)?
    }

    pub async fn history_since(&self, since_ms: i64) -> Result<Vec<Reading>, StoreError> {
        let (reply, response) = oneshot::channel();
        let request = ControlRequest::HistorySince { since_ms, reply };
        self.tx.send(request).await.map_err(|_| StoreError::ChannelClosed)?;
        response.await.map_err(|_| StoreError::ChannelClosed)?
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn panel() -> ActuatorPanel {
        ActuatorPanel::new(&[
            ("valve-intake", ActuatorKind::Valve),
            ("pump-filtration", ActuatorKind::Pump),
            ("filtration-unit", ActuatorKind::FiltrationUnit),
        ], 0)
    }

    #[test]
    fn aplicar_mueve_el_comandado_de_inmediato() {
        let mut panel = panel();
        let (token, command) = panel.apply("pump-filtration", SwitchState::On, 100).unwrap();

        let state = panel.get("pump-filtration").unwrap();
        assert_eq!(state.commanded, SwitchState::On);
        assert_eq!(state.confirmed, ConfirmedState::Unknown);
        assert_eq!(state.last_changed_ms, 100);
        assert_eq!(command.actuator_id, "pump-filtration");
        assert_eq!(command.token, token);
        assert!(!command.priority);
    }

    #[test]
    fn actuador_desconocido_se_rechaza() {
        let mut panel = panel();
        let error = panel.apply("pump-x", SwitchState::On, 100).unwrap_err();
        assert_eq!(error, StoreError::UnknownActuator { id: "pump-x".to_string() });
    }

    #[test]
    fn confirmacion_con_token_reconcilia() {
        let mut panel = panel();
        let (token, _) = panel.apply("valve-intake", SwitchState::On, 100).unwrap();
        let outcome = panel.confirm("valve-intake", SwitchState::On, Some(token), 150).unwrap();

        assert!(outcome.reconciled);
        assert!(!outcome.rolled_back);
        let state = panel.get("valve-intake").unwrap();
        assert_eq!(state.confirmed, ConfirmedState::On);
        assert_eq!(state.commanded, SwitchState::On);
        // Sin pendiente, un tick posterior no vence nada
        assert!(panel.expire_deadlines(10_000, 1_000).is_empty());
    }

    #[test]
    fn reporte_contradictorio_revierte_el_comandado() {
        let mut panel = panel();
        let (token, _) = panel.apply("valve-intake", SwitchState::On, 100).unwrap();
        let outcome = panel.confirm("valve-intake", SwitchState::Off, Some(token), 150).unwrap();

        assert!(outcome.rolled_back);
        assert!(!outcome.reconciled);
        let state = panel.get("valve-intake").unwrap();
        assert_eq!(state.commanded, SwitchState::Off);
        assert_eq!(state.confirmed, ConfirmedState::Off);
    }

    #[test]
    fn token_obsoleto_es_telemetria_no_solicitada() {
        let mut panel = panel();
        let (first, _) = panel.apply("pump-filtration", SwitchState::On, 100).unwrap();
        let (_second, _) = panel.apply("pump-filtration", SwitchState::Off, 200).unwrap();

        // Llega tarde la confirmación del primer comando
        let outcome = panel.confirm("pump-filtration", SwitchState::On, Some(first), 250).unwrap();
        assert!(!outcome.reconciled);
        assert!(!outcome.rolled_back);

        let state = panel.get("pump-filtration").unwrap();
        assert_eq!(state.confirmed, ConfirmedState::On);
        // El pendiente del segundo comando sigue armado y vence
        let expired = panel.expire_deadlines(10_000, 1_000);
        assert_eq!(expired, vec!["pump-filtration".to_string()]);
    }

    #[test]
    fn telemetria_sin_token_actualiza_el_confirmado() {
        let mut panel = panel();
        let outcome = panel.confirm("valve-intake", SwitchState::Off, None, 50).unwrap();
        assert!(!outcome.reconciled);
        assert_eq!(panel.get("valve-intake").unwrap().confirmed, ConfirmedState::Off);
    }

    #[test]
    fn vencimiento_deja_unknown_y_no_toca_el_comandado() {
        let mut panel = panel();
        panel.confirm("pump-filtration", SwitchState::Off, None, 0).unwrap();
        panel.apply("pump-filtration", SwitchState::On, 100).unwrap();

        let expired = panel.expire_deadlines(100 + 5_000, 5_000);
        assert_eq!(expired, vec!["pump-filtration".to_string()]);
        let state = panel.get("pump-filtration").unwrap();
        assert_eq!(state.confirmed, ConfirmedState::Unknown);
        assert_eq!(state.commanded, SwitchState::On);

        // El vencimiento es por única vez, el pendiente quedó cerrado
        assert!(panel.expire_deadlines(100 + 10_000, 5_000).is_empty());
    }

    #[test]
    fn pendiente_dentro_del_plazo_no_vence() {
        let mut panel = panel();
        panel.apply("pump-filtration", SwitchState::On, 100).unwrap();
        assert!(panel.expire_deadlines(100 + 4_999, 5_000).is_empty());
    }

    #[test]
    fn apagado_de_emergencia_fuerza_todo_a_off() {
        let mut panel = panel();
        panel.apply("valve-intake", SwitchState::On, 100).unwrap();
        panel.apply("pump-filtration", SwitchState::On, 100).unwrap();

        let (tokens, commands) = panel.emergency_shutdown(200);
        assert_eq!(tokens.len(), 2);
        assert_eq!(commands.len(), 2);
        assert!(commands.iter().all(|command| command.priority));
        assert!(commands.iter().all(|command| command.desired == SwitchState::Off));
        for state in panel.states() {
            assert_eq!(state.commanded, SwitchState::Off);
        }
    }

    #[test]
    fn apagado_de_emergencia_alcanza_lo_encendido_sin_comando_previo() {
        let mut panel = panel();
        // El dispositivo reporta la bomba encendida por telemetría no
        // solicitada, el comandado sigue en Off
        panel.confirm("pump-filtration", SwitchState::On, None, 100).unwrap();
        assert_eq!(panel.get("pump-filtration").unwrap().commanded, SwitchState::Off);

        let (tokens, commands) = panel.emergency_shutdown(200);
        assert_eq!(tokens.len(), 1);
        assert_eq!(commands[0].actuator_id, "pump-filtration");
        assert_eq!(commands[0].desired, SwitchState::Off);
        assert!(commands[0].priority);
        // El apagado queda pendiente de confirmación como cualquier comando
        let expired = panel.expire_deadlines(200 + 5_000, 5_000);
        assert_eq!(expired, vec!["pump-filtration".to_string()]);
    }

    #[test]
    fn apagado_sin_actuadores_encendidos_no_emite_comandos() {
        let mut panel = panel();
        let (tokens, commands) = panel.emergency_shutdown(200);
        assert!(tokens.is_empty());
        assert!(commands.is_empty());
    }

    #[test]
    fn ciclo_de_filtrado_se_detecta_en_transiciones_confirmadas() {
        let mut panel = panel();
        panel.confirm("filtration-unit", SwitchState::Off, None, 50).unwrap();
        let start = panel.confirm("filtration-unit", SwitchState::On, None, 100).unwrap();
        assert!(start.cycle_started);
        assert!(!start.cycle_completed);

        let finish = panel.confirm("filtration-unit", SwitchState::Off, None, 200).unwrap();
        assert!(finish.cycle_completed);
        assert!(!finish.cycle_started);

        // Un mismo estado repetido no es transición
        let repeat = panel.confirm("filtration-unit", SwitchState::Off, None, 300).unwrap();
        assert!(!repeat.cycle_completed);
        assert!(!repeat.cycle_started);

        // Desde Unknown tampoco hay transición de ciclo
        panel.confirm("filtration-unit", SwitchState::On, None, 400).unwrap();
        panel.apply("filtration-unit", SwitchState::Off, 500).unwrap();
        panel.expire_deadlines(500 + 5_000, 5_000);
        assert_eq!(panel.get("filtration-unit").unwrap().confirmed, ConfirmedState::Unknown);
        let quiet = panel.confirm("filtration-unit", SwitchState::Off, None, 6_000).unwrap();
        assert!(!quiet.cycle_completed);
    }

    #[test]
    fn el_primer_reporte_desde_unknown_no_es_transicion_de_ciclo() {
        let mut panel = panel();
        let outcome = panel.confirm("filtration-unit", SwitchState::On, None, 100).unwrap();
        assert!(!outcome.cycle_started);
        assert!(!outcome.cycle_completed);
    }

    #[test]
    fn los_tokens_crecen_monotonicamente() {
        let mut panel = panel();
        let (first, _) = panel.apply("valve-intake", SwitchState::On, 100).unwrap();
        let (second, _) = panel.apply("pump-filtration", SwitchState::On, 100).unwrap();
        assert!(second > first);
    }
}
