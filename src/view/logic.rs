//! Modelo de vista del tablero de monitoreo.
//!
//! Proyección de sólo lectura del snapshot publicado por el almacén, lista
//! para que la interfaz la consuma como JSON. La tarea de alimentación
//! recorre el canal `watch` como stream y serializa cada versión; el
//! transporte hacia el navegador queda fuera del núcleo.


use std::sync::Arc;
use serde::Serialize;
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error, info};
use crate::actuator::domain::ActuatorState;
use crate::alerts::domain::{Alert, Severity};
use crate::compliance::domain::ComplianceStatus;
use crate::store::domain::{HistoryStats, Reading, Snapshot};


/// Estado general del despliegue para el encabezado del tablero.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum OverallStatus {
    /// Sin lecturas registradas todavía.
    NoData,
    /// Toda métrica dentro de su límite.
    Compliant,
    /// Al menos una métrica fuera de límite.
    OverLimit,
}


/// Cantidad de alertas activas por severidad.
#[derive(Default, Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct AlertCounts {
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
}


/// Vista serializable del tablero.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub generated_at_ms: i64,
    pub overall: OverallStatus,
    pub alert_counts: AlertCounts,
    pub latest_reading: Option<Reading>,
    pub stats: Option<HistoryStats>,
    pub compliance: Vec<ComplianceStatus>,
    pub actuators: Vec<ActuatorState>,
    pub active_alerts: Vec<Alert>,
    pub auto_treatment: bool,
}


/// Proyecta el snapshot al modelo de vista del tablero.
pub fn build_view(snapshot: &Snapshot) -> DashboardView {
    let overall = if snapshot.latest_reading.is_none() {
        OverallStatus::NoData
    } else if snapshot.compliance.iter().any(|status| status.over_limit) {
        OverallStatus::OverLimit
    } else {
        OverallStatus::Compliant
    };

    let mut alert_counts = AlertCounts::default();
    for alert in &snapshot.active_alerts {
        match alert.severity {
            Severity::Critical => alert_counts.critical += 1,
            Severity::Warning => alert_counts.warning += 1,
            Severity::Info => alert_counts.info += 1,
        }
    }

    DashboardView {
        generated_at_ms: snapshot.generated_at_ms,
        overall,
        alert_counts,
        latest_reading: snapshot.latest_reading.clone(),
        stats: snapshot.stats.clone(),
        compliance: snapshot.compliance.clone(),
        actuators: snapshot.actuators.clone(),
        active_alerts: snapshot.active_alerts.clone(),
        auto_treatment: snapshot.auto_treatment,
    }
}


pub async fn dashboard_feed(snapshot_rx: watch::Receiver<Arc<Snapshot>>) {
    let mut stream = WatchStream::new(snapshot_rx);
    while let Some(snapshot) = stream.next().await {
        let view = build_view(&snapshot);
        match serde_json::to_string(&view) {
            Ok(json) => debug!("Debug: vista del tablero {json}"),
            Err(e) => error!("Error: no se pudo serializar la vista. {e}"),
        }
    }
}


pub fn start_dashboard_feed(snapshot_rx: watch::Receiver<Arc<Snapshot>>) {

    info!("Info: iniciando alimentación del tablero");
    tokio::spawn(async move {
        dashboard_feed(snapshot_rx).await;
    });
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::domain::AlertClass;
    use crate::compliance::domain::Comparison;
    use crate::store::domain::Metric;

    fn snapshot_with_reading(particle_count: f64, over_limit: bool) -> Snapshot {
        let reading = Reading {
            timestamp_ms: 100,
            confidence: 95.0,
            particle_count,
            avg_size_um: 120.0,
            turbidity_ntu: 3.5,
            ph: 7.1,
            temperature_c: 21.0,
            tds_ppm: 180.0,
        };
        let mut snapshot = Snapshot::empty(1_000);
        snapshot.latest_reading = Some(reading.clone());
        snapshot.history = vec![reading];
        snapshot.compliance = vec![ComplianceStatus {
            metric: Metric::ParticleCount,
            current_value: particle_count,
            threshold: 500.0,
            comparison: Comparison::GreaterThan,
            over_limit,
        }];
        snapshot
    }

    #[test]
    fn sin_lecturas_el_estado_general_es_sin_datos() {
        let view = build_view(&Snapshot::empty(1_000));
        assert_eq!(view.overall, OverallStatus::NoData);
        assert_eq!(view.alert_counts, AlertCounts::default());
    }

    #[test]
    fn el_estado_general_refleja_el_cumplimiento() {
        let view = build_view(&snapshot_with_reading(400.0, false));
        assert_eq!(view.overall, OverallStatus::Compliant);

        let view = build_view(&snapshot_with_reading(1_520.0, true));
        assert_eq!(view.overall, OverallStatus::OverLimit);
    }

    #[test]
    fn las_alertas_se_cuentan_por_severidad() {
        let mut snapshot = snapshot_with_reading(1_520.0, true);
        snapshot.active_alerts = vec![
            Alert {
                id: 1,
                class: AlertClass::FeedLoss,
                severity: Severity::Critical,
                message: "sin señal".to_string(),
                raised_at_ms: 10,
                cleared_at_ms: None,
            },
            Alert {
                id: 2,
                class: AlertClass::OverLimit(Metric::ParticleCount),
                severity: Severity::Warning,
                message: "fuera de límite".to_string(),
                raised_at_ms: 20,
                cleared_at_ms: None,
            },
        ];
        let view = build_view(&snapshot);
        assert_eq!(view.alert_counts, AlertCounts { critical: 1, warning: 1, info: 0 });
    }

    #[test]
    fn la_vista_se_serializa_a_json() {
        let view = build_view(&snapshot_with_reading(1_520.0, true));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["overall"], "OverLimit");
        assert_eq!(json["latest_reading"]["particle_count"], 1_520.0);
        assert_eq!(json["compliance"][0]["over_limit"], true);
    }
}
