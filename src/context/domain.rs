//! Definición del Contexto de Aplicación (Shared State).
//!
//! Este módulo implementa el patrón de **Estado Compartido** para aplicaciones asíncronas.
//! El `AppContext` actúa como un contenedor de "Inyección de Dependencias" manual,
//! agrupando los recursos que deben ser accesibles por múltiples tareas concurrentes
//! (Configuración, registro de límites de cumplimiento, interruptor de tratamiento).
//!
//! El registro de límites y el interruptor son mutables desde la capa de
//! vistas sin pasar por el camino de mutación del almacén: los límites son
//! configuración, no estado derivado.


use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use dashmap::DashMap;
use crate::compliance::domain::ComplianceLimit;
use crate::config::limits::DEFAULTS;
use crate::store::domain::Metric;
use crate::system::domain::System;


#[derive(Clone, Debug)]
pub struct AppContext {
    pub system: Arc<System>,
    limits: Arc<DashMap<Metric, ComplianceLimit>>,
    auto_treatment: Arc<AtomicBool>,
}


impl AppContext {

    /// Crea el contexto con los límites por defecto y el interruptor de
    /// tratamiento en su estado inicial de configuración.
    pub fn new(system: System) -> AppContext {
        let limits = DashMap::new();
        for limit in DEFAULTS {
            limits.insert(limit.metric, limit);
        }
        let auto_treatment = Arc::new(AtomicBool::new(system.auto_treatment));
        AppContext {
            system: Arc::new(system),
            limits: Arc::new(limits),
            auto_treatment,
        }
    }

    /// Límites vigentes en orden estable por métrica.
    pub fn limits_vec(&self) -> Vec<ComplianceLimit> {
        let mut limits: Vec<ComplianceLimit> = self
            .limits
            .iter()
            .map(|entry| *entry.value())
            .collect();
        limits.sort_by_key(|limit| limit.metric);
        limits
    }

    /// Crea o reemplaza el límite de una métrica en caliente.
    pub fn set_limit(&self, limit: ComplianceLimit) {
        self.limits.insert(limit.metric, limit);
    }

    /// Quita el límite de una métrica, que deja de evaluarse.
    pub fn remove_limit(&self, metric: Metric) -> Option<ComplianceLimit> {
        self.limits.remove(&metric).map(|(_, limit)| limit)
    }

    pub fn auto_treatment_enabled(&self) -> bool {
        self.auto_treatment.load(Ordering::Relaxed)
    }

    pub fn set_auto_treatment(&self, enabled: bool) {
        self.auto_treatment.store(enabled, Ordering::Relaxed);
    }
}
