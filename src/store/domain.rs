//! Dominio del almacén de monitoreo y modelos de datos.
//!
//! Este módulo define las estructuras fundamentales del servicio: la lectura
//! del sensor de microplásticos, el historial acotado con marca de desalojo,
//! el snapshot inmutable publicado hacia las vistas y los mensajes que
//! circulan por los canales internos (ingesta, control y tick).
//!


use std::collections::VecDeque;
use std::fmt;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tokio::sync::oneshot;
use crate::actuator::domain::{ActuatorState, CommandToken, SwitchState};
use crate::alerts::domain::Alert;
use crate::compliance::domain::ComplianceStatus;


/// Magnitudes medidas por el nodo sensor.
///
/// Cada variante corresponde a un campo numérico de `Reading` y se utiliza
/// como clave de los límites de cumplimiento y de las alertas por métrica.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    ParticleCount,
    AvgSize,
    Confidence,
    Turbidity,
    Ph,
    Temperature,
    Tds,
}


impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::ParticleCount => "particle_count",
            Metric::AvgSize => "avg_size_um",
            Metric::Confidence => "confidence",
            Metric::Turbidity => "turbidity_ntu",
            Metric::Ph => "ph",
            Metric::Temperature => "temperature_c",
            Metric::Tds => "tds_ppm",
        };
        f.write_str(name)
    }
}


/// Lectura puntual del sensor de microplásticos.
///
/// Inmutable una vez registrada. El almacén sólo acepta lecturas con
/// timestamp estrictamente creciente respecto de la última registrada.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    /// Epoch UTC en milisegundos asignado por el nodo sensor.
    pub timestamp_ms: i64,
    /// Confianza de la detección en porcentaje, rango [0, 100].
    pub confidence: f64,
    /// Concentración de partículas en puntos por litro.
    pub particle_count: f64,
    pub avg_size_um: f64,
    pub turbidity_ntu: f64,
    pub ph: f64,
    pub temperature_c: f64,
    pub tds_ppm: f64,
}


impl Reading {

    /// Devuelve el valor numérico asociado a una métrica.
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::ParticleCount => self.particle_count,
            Metric::AvgSize => self.avg_size_um,
            Metric::Confidence => self.confidence,
            Metric::Turbidity => self.turbidity_ntu,
            Metric::Ph => self.ph,
            Metric::Temperature => self.temperature_c,
            Metric::Tds => self.tds_ppm,
        }
    }

    /// Valida los rangos físicos de la lectura.
    ///
    /// # Comportamiento
    /// * Todo campo debe ser un número finito.
    /// * `confidence` debe estar en [0, 100] y `ph` en [0, 14].
    /// * `particle_count`, `avg_size_um`, `turbidity_ntu` y `tds_ppm` no
    ///   pueden ser negativos. La temperatura no se restringe.
    ///
    /// # Retorno
    /// * `Ok(())` si la lectura es físicamente válida.
    /// * `Err(StoreError::Validation)` con el motivo exacto del rechazo.
    pub fn validate(&self) -> Result<(), StoreError> {
        let fields = [
            ("confidence", self.confidence),
            ("particle_count", self.particle_count),
            ("avg_size_um", self.avg_size_um),
            ("turbidity_ntu", self.turbidity_ntu),
            ("ph", self.ph),
            ("temperature_c", self.temperature_c),
            ("tds_ppm", self.tds_ppm),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(StoreError::Validation {
                    reason: format!("valor no finito en {name}"),
                });
            }
        }
        if !(0.0..=100.0).contains(&self.confidence) {
            return Err(StoreError::Validation {
                reason: format!("confidence fuera de rango [0,100]: {}", self.confidence),
            });
        }
        if self.particle_count < 0.0 {
            return Err(StoreError::Validation {
                reason: format!("particle_count negativo: {}", self.particle_count),
            });
        }
        if self.avg_size_um < 0.0 {
            return Err(StoreError::Validation {
                reason: format!("avg_size_um negativo: {}", self.avg_size_um),
            });
        }
        if self.turbidity_ntu < 0.0 {
            return Err(StoreError::Validation {
                reason: format!("turbidity_ntu negativo: {}", self.turbidity_ntu),
            });
        }
        if !(0.0..=14.0).contains(&self.ph) {
            return Err(StoreError::Validation {
                reason: format!("ph fuera de rango [0,14]: {}", self.ph),
            });
        }
        if self.tds_ppm < 0.0 {
            return Err(StoreError::Validation {
                reason: format!("tds_ppm negativo: {}", self.tds_ppm),
            });
        }
        Ok(())
    }
}


/// Historial acotado de lecturas con marca de desalojo.
///
/// Anillo de capacidad fija: al llegar una lectura con el buffer lleno se
/// desaloja la más antigua y se registra su timestamp en `evicted_through`.
/// Esa marca permite a `since` detectar consumidores con un ancla anterior
/// a la ventana retenida.
#[derive(Debug, Clone)]
pub struct HistoryRing {
    buffer: VecDeque<Reading>,
    capacity: usize,
    evicted_through: Option<i64>,
}


impl HistoryRing {

    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            evicted_through: None,
        }
    }

    pub fn push(&mut self, reading: Reading) {
        if self.buffer.len() == self.capacity {
            // La más nueva nunca se desaloja
            if let Some(evicted) = self.buffer.pop_front() {
                self.evicted_through = Some(evicted.timestamp_ms);
            }
        }
        self.buffer.push_back(reading);
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.buffer.back()
    }

    /// Lectura incremental del historial.
    ///
    /// Devuelve las lecturas con timestamp estrictamente posterior al ancla.
    /// Si el ancla quedó detrás de la marca de desalojo el consumidor perdió
    /// lecturas y debe volver a pedir el snapshot completo.
    pub fn since(&self, since_ms: i64) -> Result<Vec<Reading>, StoreError> {
        if let Some(watermark) = self.evicted_through {
            if since_ms < watermark {
                let oldest = self
                    .buffer
                    .front()
                    .map(|reading| reading.timestamp_ms)
                    .unwrap_or(watermark);
                return Err(StoreError::StaleSnapshot { oldest_retained: oldest });
            }
        }
        Ok(self
            .buffer
            .iter()
            .filter(|reading| reading.timestamp_ms > since_ms)
            .cloned()
            .collect())
    }

    pub fn to_vec(&self) -> Vec<Reading> {
        self.buffer.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn evicted_through(&self) -> Option<i64> {
        self.evicted_through
    }
}


/// Resumen estadístico de la ventana retenida.
///
/// Derivación pura para el panel analítico, se recalcula en cada snapshot
/// y nunca se almacena como estado autoritativo.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryStats {
    pub samples: usize,
    pub particle_count_min: f64,
    pub particle_count_mean: f64,
    pub particle_count_max: f64,
    pub confidence_mean: f64,
}


impl HistoryStats {

    pub fn from_readings(readings: &[Reading]) -> Option<HistoryStats> {
        let first = readings.first()?;
        let mut minimum = first.particle_count;
        let mut maximum = first.particle_count;
        let mut particle_sum = 0.0;
        let mut confidence_sum = 0.0;
        for reading in readings {
            minimum = minimum.min(reading.particle_count);
            maximum = maximum.max(reading.particle_count);
            particle_sum += reading.particle_count;
            confidence_sum += reading.confidence;
        }
        let samples = readings.len();
        Some(HistoryStats {
            samples,
            particle_count_min: minimum,
            particle_count_mean: particle_sum / samples as f64,
            particle_count_max: maximum,
            confidence_mean: confidence_sum / samples as f64,
        })
    }
}


/// Vista inmutable del estado de monitoreo.
///
/// Publicada como `Arc<Snapshot>` por la tarea del almacén. Contiene datos
/// propios en su totalidad, ningún consumidor puede alcanzar el estado
/// interno del almacén a través de ella.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub generated_at_ms: i64,
    pub latest_reading: Option<Reading>,
    pub history: Vec<Reading>,
    pub stats: Option<HistoryStats>,
    pub actuators: Vec<ActuatorState>,
    pub compliance: Vec<ComplianceStatus>,
    pub active_alerts: Vec<Alert>,
    pub auto_treatment: bool,
}


impl Snapshot {

    /// Snapshot vacío para el valor inicial del canal `watch`.
    pub fn empty(generated_at_ms: i64) -> Snapshot {
        Snapshot {
            generated_at_ms,
            latest_reading: None,
            history: Vec::new(),
            stats: None,
            actuators: Vec::new(),
            compliance: Vec::new(),
            active_alerts: Vec::new(),
            auto_treatment: false,
        }
    }
}


/// Categorización de errores operativos del almacén.
///
/// Toda mutación rechazada devuelve un motivo que distingue fallo de
/// validación, timeout de comando y fallo de dispositivo.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("validación fallida: {reason}")]
    Validation { reason: String },

    #[error("sin confirmación del actuador {actuator} dentro del plazo")]
    CommandTimeout { actuator: String },

    #[error("snapshot obsoleto: el historial retenido comienza en {oldest_retained}")]
    StaleSnapshot { oldest_retained: i64 },

    #[error("actuador desconocido: {id}")]
    UnknownActuator { id: String },

    #[error("canal interno cerrado")]
    ChannelClosed,
}


/// Telemetría de actuador tal como la entrega la capa de dispositivos.
///
/// El estado llega como texto crudo ("on"/"off") y el token sólo está
/// presente cuando el reporte responde a un comando emitido.
#[derive(Debug, Clone, PartialEq)]
pub struct ActuatorFrame {
    pub actuator_id: String,
    pub reported: String,
    pub token: Option<u64>,
}


/// Mensajes crudos del adaptador de ingesta.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorMessage {
    Reading(Reading),
    Actuator(ActuatorFrame),
}


/// Eventos ya traducidos que entran al camino único de mutación.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Record(Reading),
    Confirm {
        actuator_id: String,
        reported: SwitchState,
        token: Option<CommandToken>,
    },
}


/// Solicitudes de control con respuesta por `oneshot`.
pub enum ControlRequest {
    Apply {
        actuator_id: String,
        desired: SwitchState,
        reply: oneshot::Sender<Result<CommandToken, StoreError>>,
    },
    EmergencyShutdown {
        reply: oneshot::Sender<Result<Vec<CommandToken>, StoreError>>,
    },
    HistorySince {
        since_ms: i64,
        reply: oneshot::Sender<Result<Vec<Reading>, StoreError>>,
    },
}
