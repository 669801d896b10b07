//! Dominio de alertas operativas.


use serde::{Serialize, Deserialize};
use crate::store::domain::Metric;


/// Severidad de una alerta. El orden derivado va de menor a mayor, lo que
/// permite ordenar el tablero con una comparación invertida.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}


/// Clase de condición que dispara una alerta.
///
/// Es la clave de deduplicación: a lo sumo una alerta activa por clase. Las
/// clases por métrica y por actuador llevan su sujeto, dos condiciones
/// físicas distintas nunca se enmascaran entre sí.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AlertClass {
    /// El sensor dejó de entregar lecturas dentro de la ventana configurada.
    FeedLoss,
    /// Una métrica quedó fuera de su límite de cumplimiento.
    OverLimit(Metric),
    /// Un actuador no confirmó un comando o confirmó un estado inesperado.
    DeviceFault(String),
    /// La unidad de filtrado terminó un ciclo de tratamiento.
    CycleComplete,
}


/// Alerta emitida por el motor.
///
/// Cada activación recibe un id nuevo, una alerta despejada nunca se
/// resucita.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: u64,
    pub class: AlertClass,
    pub severity: Severity,
    pub message: String,
    pub raised_at_ms: i64,
    pub cleared_at_ms: Option<i64>,
}
