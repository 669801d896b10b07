//! Dominio de cumplimiento normativo.
//!
//! Define los límites configurados por métrica y el estado de cumplimiento
//! derivado. Los límites son configuración pura, nunca se derivan de las
//! lecturas; el estado se recalcula en cada snapshot.


use serde::{Serialize, Deserialize};
use crate::store::domain::Metric;


/// Dirección de la comparación contra el umbral.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Comparison {
    GreaterThan,
    LessThan,
}


/// Límite de cumplimiento configurado para una métrica.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ComplianceLimit {
    pub metric: Metric,
    /// Umbral primario de la métrica.
    pub threshold: f64,
    pub comparison: Comparison,
    /// Umbral secundario más estricto. Al superarlo, la alerta por exceso
    /// escala de advertencia a crítica.
    pub critical_threshold: Option<f64>,
}


/// Estado de cumplimiento de una métrica frente a su límite.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ComplianceStatus {
    pub metric: Metric,
    pub current_value: f64,
    pub threshold: f64,
    pub comparison: Comparison,
    pub over_limit: bool,
}
