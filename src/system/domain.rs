//! Módulo de configuración central y gestión del entorno de ejecución.
//!
//! Este módulo actúa como la fuente única de verdad para la configuración de la aplicación.
//! Se encarga de leer las variables de entorno, establecer valores por defecto seguros
//! y proveer las estructuras necesarias para iniciar los subsistemas (Almacén, Tick, Logging).
//!
//! # Funcionalidades Principales
//! * **Carga de Configuración:** Lee de `.env` en desarrollo y variables de sistema en producción.
//! * **Observabilidad:** Configura `tracing_subscriber` para logs estructurados o legibles.
//! * **Parámetros Operativos:** Define retención, plazos y cadencias del despliegue.
//!


use std::env;
use tracing_subscriber::{fmt, EnvFilter};


/// Representa la configuración global del sistema y el estado del entorno.
///
/// Esta estructura centraliza todas las variables de entorno y configuraciones
/// necesarias para iniciar los subsistemas (Almacén, Temporizador, Simulación, Logging).
///
#[derive(Debug)]
pub struct System {
    /// Cantidad máxima de lecturas retenidas en el historial.
    /// Por defecto: `288`.
    pub history_capacity: usize,

    /// Intervalo del tick de evaluación en milisegundos.
    /// Por defecto: `1000`.
    pub tick_interval_ms: i64,

    /// Plazo máximo para confirmar un comando de actuador, en milisegundos.
    /// Por defecto: `5000`.
    pub command_timeout_ms: i64,

    /// Ventana de silencio del sensor antes de declarar pérdida de señal,
    /// en milisegundos. Por defecto: `15000`.
    pub feed_window_ms: i64,

    /// Estado inicial del tratamiento automático.
    /// Por defecto: `true`.
    pub auto_treatment: bool,

    /// Actuador que enciende el tratamiento automático.
    /// Por defecto: `pump-filtration`.
    pub treatment_actuator: String,

    /// Cadencia del sensor simulado en milisegundos.
    /// Por defecto: `2000`.
    pub sensor_interval_ms: i64,

    /// La simulación descarta una confirmación cada N comandos para
    /// ejercitar el camino de vencimiento. `0` desactiva el descarte.
    /// Por defecto: `0`.
    pub sim_drop_every: u64,

    /// Entorno de ejecución actual (`development`, `staging`, `production`).
    /// Afecta el formato de logs y la carga de archivos `.env`.
    pub environment: String,

    /// Nivel de detalle de los logs (ej. `info`, `debug`, `warn`).
    /// Se autoconfigura según el `environment` si no se especifica.
    pub rust_log: String,
}


impl System {

    /// Carga la configuración desde las variables de entorno.
    ///
    /// # Comportamiento
    /// * Si `ENVIRONMENT` es "development", intenta cargar un archivo `.env`.
    /// * Establece valores por defecto para toda variable ausente.
    ///
    /// # Panics
    /// * Si las variables numéricas (`HISTORY_CAPACITY`, `TICK_INTERVAL_MS`,
    ///   etc.) no son números válidos.
    pub fn new() -> System {

        let environment = env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".into());

        if environment == "development" {
            dotenv::dotenv().ok();
        }

        System {
            history_capacity: env::var("HISTORY_CAPACITY")
                .unwrap_or("288".to_string())
                .parse()
                .expect("HISTORY_CAPACITY debe ser un número"),

            tick_interval_ms: env::var("TICK_INTERVAL_MS")
                .unwrap_or("1000".to_string())
                .parse()
                .expect("TICK_INTERVAL_MS debe ser un número"),

            command_timeout_ms: env::var("COMMAND_TIMEOUT_MS")
                .unwrap_or("5000".to_string())
                .parse()
                .expect("COMMAND_TIMEOUT_MS debe ser un número"),

            feed_window_ms: env::var("FEED_WINDOW_MS")
                .unwrap_or("15000".to_string())
                .parse()
                .expect("FEED_WINDOW_MS debe ser un número"),

            auto_treatment: env::var("AUTO_TREATMENT")
                .unwrap_or("true".to_string())
                .parse()
                .expect("AUTO_TREATMENT debe ser true o false"),

            treatment_actuator: env::var("TREATMENT_ACTUATOR")
                .unwrap_or("pump-filtration".to_string()),

            sensor_interval_ms: env::var("SENSOR_INTERVAL_MS")
                .unwrap_or("2000".to_string())
                .parse()
                .expect("SENSOR_INTERVAL_MS debe ser un número"),

            sim_drop_every: env::var("SIM_DROP_EVERY")
                .unwrap_or("0".to_string())
                .parse()
                .expect("SIM_DROP_EVERY debe ser un número"),

            rust_log: env::var("RUST_LOG")
                .unwrap_or_else(|_| {
                    match environment.as_str() {
                        "development" => "debug".to_string(),
                        "staging" => "info".to_string(),
                        _ => "warn".to_string(),
                    }
                }),

            environment,
        }
    }
}


/// Inicializa el sistema de trazabilidad y logs (Tracing).
///
/// Configura el formato de salida basándose en el entorno:
/// * **Production**: Salida JSON (para logs estructurados en la nube).
/// * **Development/Otros**: Salida "Pretty" (colores y formato legible).
///
/// # Argumentos
/// * `system`: Referencia a la configuración cargada para leer el nivel de log (`rust_log`).
pub fn init_tracing(system: &System) {

    let filter = EnvFilter::try_new(&system.rust_log)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt().with_env_filter(filter).with_target(false);

    if system.environment == "production" {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}
