//! Evaluación de cumplimiento sobre la última lectura.
//!
//! Funciones puras y sin estado, seguras de invocar concurrentemente sobre
//! un snapshot. El disparo del tratamiento automático es responsabilidad del
//! almacén, que aplica el latch por transición sobre el resultado de
//! `any_over_limit`.


use crate::alerts::domain::Severity;
use crate::compliance::domain::{Comparison, ComplianceLimit, ComplianceStatus};
use crate::store::domain::Reading;


/// Evalúa la lectura contra todos los límites configurados.
///
/// La comparación es exclusiva: un valor exactamente igual al umbral NO se
/// considera fuera de límite. Con límite 500 y valor 500 la métrica cumple,
/// con valor 1520 no cumple.
///
/// # Retorno
/// * Un `ComplianceStatus` por límite, en el mismo orden de entrada.
pub fn evaluate(reading: &Reading, limits: &[ComplianceLimit]) -> Vec<ComplianceStatus> {
    limits
        .iter()
        .map(|limit| {
            let current_value = reading.value(limit.metric);
            let over_limit = breaches(limit.comparison, current_value, limit.threshold);
            ComplianceStatus {
                metric: limit.metric,
                current_value,
                threshold: limit.threshold,
                comparison: limit.comparison,
                over_limit,
            }
        })
        .collect()
}


/// Indica si alguna métrica quedó fuera de límite.
pub fn any_over_limit(statuses: &[ComplianceStatus]) -> bool {
    statuses.iter().any(|status| status.over_limit)
}


/// Severidad de la alerta por exceso de una métrica.
///
/// Advertencia por defecto; crítica cuando el valor también supera el
/// umbral secundario del límite, con la misma comparación exclusiva.
pub fn severity_for(limit: &ComplianceLimit, current_value: f64) -> Severity {
    match limit.critical_threshold {
        Some(critical) if breaches(limit.comparison, current_value, critical) => Severity::Critical,
        _ => Severity::Warning,
    }
}


fn breaches(comparison: Comparison, current_value: f64, threshold: f64) -> bool {
    match comparison {
        Comparison::GreaterThan => current_value > threshold,
        Comparison::LessThan => current_value < threshold,
    }
}
