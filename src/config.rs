//! Constantes operativas del servicio de monitoreo.
//!
//! Valores fijos del despliegue que no dependen del entorno de ejecución;
//! la configuración variable vive en `System` y se carga desde variables
//! de entorno.


/// Capacidades de los canales internos (MPSC).
pub mod channels {
    /// Telemetría cruda del sensor y de los dispositivos.
    pub const SENSOR: usize = 200;
    /// Eventos traducidos hacia el almacén.
    pub const STORE: usize = 200;
    /// Solicitudes de control de la capa de vistas.
    pub const CONTROL: usize = 10;
    /// Ticks del temporizador de evaluación.
    pub const TICK: usize = 10;
    /// Comandos salientes hacia la capa de dispositivos.
    pub const DEVICE: usize = 10;
}


/// Inventario fijo de actuadores del despliegue.
pub mod actuators {
    use crate::actuator::domain::ActuatorKind;

    pub const INVENTORY: &[(&str, ActuatorKind)] = &[
        ("valve-intake", ActuatorKind::Valve),
        ("pump-filtration", ActuatorKind::Pump),
        ("filtration-unit", ActuatorKind::FiltrationUnit),
    ];
}


/// Límites de cumplimiento por defecto.
///
/// Son el punto de partida del registro en `AppContext`; la capa de vistas
/// puede reajustarlos en caliente sin reiniciar el servicio.
pub mod limits {
    use crate::compliance::domain::{Comparison, ComplianceLimit};
    use crate::store::domain::Metric;

    pub const DEFAULTS: [ComplianceLimit; 5] = [
        ComplianceLimit {
            metric: Metric::ParticleCount,
            threshold: 500.0,
            comparison: Comparison::GreaterThan,
            critical_threshold: Some(1_500.0),
        },
        ComplianceLimit {
            metric: Metric::Turbidity,
            threshold: 50.0,
            comparison: Comparison::GreaterThan,
            critical_threshold: None,
        },
        ComplianceLimit {
            metric: Metric::Confidence,
            threshold: 40.0,
            comparison: Comparison::LessThan,
            critical_threshold: None,
        },
        ComplianceLimit {
            metric: Metric::Ph,
            threshold: 6.5,
            comparison: Comparison::LessThan,
            critical_threshold: None,
        },
        ComplianceLimit {
            metric: Metric::Tds,
            threshold: 1_000.0,
            comparison: Comparison::GreaterThan,
            critical_threshold: None,
        },
    ];
}


/// Constantes de la capa de dispositivos simulada.
pub mod simulation {
    use tokio::time::Duration;

    /// Latencia entre el comando y su confirmación simulada.
    pub const CONFIRM_LATENCY: Duration = Duration::from_millis(300);
}
