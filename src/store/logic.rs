//! Lógica del almacén de monitoreo.
//!
//! `MonitoringStore` es el dueño único del estado autoritativo: historial de
//! lecturas, panel de actuadores, tablero de alertas y el latch del
//! tratamiento automático. La tarea `run_store` serializa toda mutación
//! atendiendo tres canales con `select!` (ingesta, control y tick) y publica
//! un `Arc<Snapshot>` por el canal `watch` después de cada evento.
//!
//! # Flujo de Trabajo
//! 1. Las lecturas entran por la ingesta, se validan y disparan la
//!    evaluación de cumplimiento y las transiciones de alertas.
//! 2. Las solicitudes de control (comandos, apagado de emergencia, lecturas
//!    incrementales) responden por `oneshot` sin bloquear al solicitante
//!    más allá de la sección crítica.
//! 3. El tick revisa la pérdida de señal del sensor y los plazos de los
//!    comandos pendientes, la detección de fallas es determinista y por
//!    sondeo, nunca una espera bloqueante.


use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, warn};
use chrono::Utc;
use crate::actuator::domain::{CommandToken, DeviceCommand, SwitchState};
use crate::actuator::logic::ActuatorPanel;
use crate::alerts::domain::{AlertClass, Severity};
use crate::alerts::logic::AlertBoard;
use crate::compliance::domain::Comparison;
use crate::compliance::logic::{any_over_limit, evaluate, severity_for};
use crate::config::actuators::INVENTORY;
use crate::context::domain::AppContext;
use crate::store::domain::{ControlRequest, HistoryRing, HistoryStats, Reading, Snapshot,
                           StoreError, StoreEvent};
use crate::tick::domain::Tick;


/// Estado autoritativo del despliegue de monitoreo.
pub struct MonitoringStore {
    ctx: AppContext,
    history: HistoryRing,
    panel: ActuatorPanel,
    board: AlertBoard,
    last_arrival_ms: i64,
    over_limit_latched: bool,
}


impl MonitoringStore {

    pub fn new(ctx: AppContext, now_ms: i64) -> MonitoringStore {
        let history = HistoryRing::new(ctx.system.history_capacity);
        let panel = ActuatorPanel::new(INVENTORY, now_ms);
        MonitoringStore {
            ctx,
            history,
            panel,
            board: AlertBoard::new(),
            last_arrival_ms: now_ms,
            over_limit_latched: false,
        }
    }

    /// Registra una lectura del sensor.
    ///
    /// # Comportamiento
    /// * Rechaza lecturas fuera de rango físico o con timestamp que no
    ///   supere estrictamente al de la última registrada.
    /// * Evalúa el cumplimiento contra los límites vigentes y ajusta las
    ///   alertas por métrica.
    /// * Con tratamiento automático habilitado, la transición hacia fuera
    ///   de límite emite un único comando para encender el actuador de
    ///   tratamiento.
    ///
    /// # Retorno
    /// * Los comandos de dispositivo a despachar (a lo sumo uno).
    /// * `Err(StoreError::Validation)` con el motivo del rechazo.
    pub fn record_reading(&mut self,
                          reading: Reading,
                          now_ms: i64) -> Result<Vec<DeviceCommand>, StoreError> {

        reading.validate()?;
        if let Some(last) = self.history.latest() {
            if reading.timestamp_ms <= last.timestamp_ms {
                return Err(StoreError::Validation {
                    reason: format!("timestamp fuera de orden: {} no supera a {}",
                                    reading.timestamp_ms, last.timestamp_ms),
                });
            }
        }

        let limits = self.ctx.limits_vec();
        let statuses = evaluate(&reading, &limits);
        self.history.push(reading);
        self.last_arrival_ms = now_ms;
        self.board.clear(&AlertClass::FeedLoss, now_ms);

        for (limit, status) in limits.iter().zip(&statuses) {
            let class = AlertClass::OverLimit(status.metric);
            if status.over_limit {
                let severity = severity_for(limit, status.current_value);
                let message = format!("{} fuera de límite: {} {} {}",
                                      status.metric,
                                      status.current_value,
                                      comparison_symbol(status.comparison),
                                      status.threshold);
                self.board.raise(class, severity, message, now_ms);
            } else {
                self.board.clear(&class, now_ms);
            }
        }

        // Un límite quitado del registro deja de sostener su alerta
        for alert in self.board.active_sorted() {
            if let AlertClass::OverLimit(metric) = alert.class {
                if !limits.iter().any(|limit| limit.metric == metric) {
                    self.board.clear(&AlertClass::OverLimit(metric), now_ms);
                }
            }
        }

        let mut commands = Vec::new();
        let over_now = any_over_limit(&statuses);
        // Un solo disparo por transición hacia fuera de límite
        if over_now && !self.over_limit_latched && self.ctx.auto_treatment_enabled() {
            let already_on = self
                .panel
                .get(&self.ctx.system.treatment_actuator)
                .map(|state| state.commanded == SwitchState::On)
                .unwrap_or(false);
            if already_on {
                debug!("Debug: tratamiento automático omitido, {} ya está comandado",
                       self.ctx.system.treatment_actuator);
            } else {
                match self.panel.apply(&self.ctx.system.treatment_actuator, SwitchState::On, now_ms) {
                    Ok((token, command)) => {
                        info!("Info: tratamiento automático disparado, token {} para {}",
                              token.0, command.actuator_id);
                        commands.push(command);
                    }
                    Err(e) => error!("Error: no se pudo disparar el tratamiento automático. {e}"),
                }
            }
        }
        self.over_limit_latched = over_now;
        Ok(commands)
    }

    /// Emite un comando manual hacia un actuador.
    pub fn apply_command(&mut self,
                         actuator_id: &str,
                         desired: SwitchState,
                         now_ms: i64) -> Result<(CommandToken, DeviceCommand), StoreError> {
        self.panel.apply(actuator_id, desired, now_ms)
    }

    /// Procesa una confirmación de la capa de dispositivos.
    ///
    /// Las confirmaciones pueden llegar fuera de orden y se aceptan. Una
    /// contradicción con el comando pendiente revierte el comandado y
    /// levanta la falla del dispositivo; cualquier otra confirmación
    /// resuelve el estado y la despeja.
    pub fn confirm_actuator(&mut self,
                            actuator_id: &str,
                            reported: SwitchState,
                            token: Option<CommandToken>,
                            now_ms: i64) -> Result<(), StoreError> {

        let outcome = self.panel.confirm(actuator_id, reported, token, now_ms)?;
        if outcome.reconciled {
            debug!("Debug: comando confirmado por {actuator_id}");
        }
        let fault = AlertClass::DeviceFault(actuator_id.to_string());
        if outcome.rolled_back {
            let message = format!("el actuador {actuator_id} confirmó un estado contrario al comandado");
            self.board.raise(fault, Severity::Critical, message, now_ms);
        } else {
            self.board.clear(&fault, now_ms);
        }
        if outcome.cycle_completed {
            self.board.raise(AlertClass::CycleComplete,
                             Severity::Info,
                             "la unidad de filtrado completó un ciclo de tratamiento".to_string(),
                             now_ms);
        }
        if outcome.cycle_started {
            self.board.clear(&AlertClass::CycleComplete, now_ms);
        }
        Ok(())
    }

    /// Apagado de emergencia con prioridad.
    ///
    /// Todo actuador comandado en `On` pasa a `Off` dentro de esta única
    /// mutación, ningún snapshot puede observar una aplicación parcial.
    pub fn emergency_shutdown(&mut self, now_ms: i64) -> (Vec<CommandToken>, Vec<DeviceCommand>) {
        let (tokens, commands) = self.panel.emergency_shutdown(now_ms);
        info!("Info: apagado de emergencia, {} comandos prioritarios emitidos", commands.len());
        (tokens, commands)
    }

    /// Revisión periódica de plazos.
    ///
    /// # Comportamiento
    /// * Levanta la pérdida de señal si el sensor superó la ventana sin
    ///   entregar lecturas aceptadas.
    /// * Vence los comandos pendientes fuera de plazo: el actuador queda
    ///   `Unknown` y se levanta exactamente una falla de dispositivo.
    pub fn on_tick(&mut self, now_ms: i64) {
        if now_ms - self.last_arrival_ms > self.ctx.system.feed_window_ms {
            let message = format!("sin lecturas del sensor dentro de la ventana de {} ms",
                                  self.ctx.system.feed_window_ms);
            self.board.raise(AlertClass::FeedLoss, Severity::Critical, message, now_ms);
        }
        for actuator_id in self.panel.expire_deadlines(now_ms, self.ctx.system.command_timeout_ms) {
            let message = StoreError::CommandTimeout { actuator: actuator_id.clone() }.to_string();
            warn!("Warning: {message}");
            self.board.raise(AlertClass::DeviceFault(actuator_id),
                             Severity::Critical,
                             message,
                             now_ms);
        }
    }

    /// Lectura incremental del historial para consumidores con ancla.
    pub fn history_since(&self, since_ms: i64) -> Result<Vec<Reading>, StoreError> {
        self.history.since(since_ms)
    }

    /// Registra que un comando no pudo entregarse a la capa de dispositivos.
    pub fn report_dispatch_failure(&mut self, actuator_id: &str, now_ms: i64) {
        let message = format!("no se pudo entregar el comando al dispositivo {actuator_id}");
        self.board.raise(AlertClass::DeviceFault(actuator_id.to_string()),
                         Severity::Critical,
                         message,
                         now_ms);
    }

    /// Construye la vista inmutable del estado actual.
    pub fn snapshot(&self, now_ms: i64) -> Snapshot {
        let latest_reading = self.history.latest().cloned();
        let limits = self.ctx.limits_vec();
        let compliance = match &latest_reading {
            Some(reading) => evaluate(reading, &limits),
            None => Vec::new(),
        };
        let history = self.history.to_vec();
        let stats = HistoryStats::from_readings(&history);
        Snapshot {
            generated_at_ms: now_ms,
            latest_reading,
            history,
            stats,
            actuators: self.panel.states(),
            compliance,
            active_alerts: self.board.active_sorted(),
            auto_treatment: self.ctx.auto_treatment_enabled(),
        }
    }
}


fn comparison_symbol(comparison: Comparison) -> &'static str {
    match comparison {
        Comparison::GreaterThan => ">",
        Comparison::LessThan => "<",
    }
}


async fn dispatch_commands(commands: Vec<DeviceCommand>,
                           tx_device: &mpsc::Sender<DeviceCommand>,
                           store: &mut MonitoringStore) {
    for command in commands {
        let actuator_id = command.actuator_id.clone();
        if tx_device.send(command).await.is_err() {
            error!("Error: capa de dispositivos inalcanzable, comando para {} perdido", actuator_id);
            store.report_dispatch_failure(&actuator_id, Utc::now().timestamp_millis());
        }
    }
}


fn publish_snapshot(snapshot_tx: &watch::Sender<Arc<Snapshot>>, store: &MonitoringStore) {
    let snapshot = Arc::new(store.snapshot(Utc::now().timestamp_millis()));
    if snapshot_tx.send(snapshot).is_err() {
        debug!("Debug: no hay consumidores de snapshot");
    }
}


/// Ejecuta el bucle principal del almacén de monitoreo.
///
/// # Argumentos
/// * `rx_ingest`: Canal de eventos traducidos por el adaptador de ingesta.
/// * `rx_control`: Canal de solicitudes de la capa de vistas.
/// * `rx_tick`: Canal del temporizador de evaluación.
/// * `tx_device`: Canal de comandos hacia la capa de dispositivos.
/// * `snapshot_tx`: Canal `watch` donde se publica cada snapshot.
/// * `app_context`: Configuración global y registro de límites.
#[instrument(
    name = "run_store_task",
    skip(rx_ingest, rx_control, rx_tick, tx_device, snapshot_tx, app_context)
)]
pub async fn run_store(mut rx_ingest: mpsc::Receiver<StoreEvent>,
                       mut rx_control: mpsc::Receiver<ControlRequest>,
                       mut rx_tick: mpsc::Receiver<Tick>,
                       tx_device: mpsc::Sender<DeviceCommand>,
                       snapshot_tx: watch::Sender<Arc<Snapshot>>,
                       app_context: AppContext) {

    info!("Info: store task creada");
    let mut store = MonitoringStore::new(app_context, Utc::now().timestamp_millis());
    publish_snapshot(&snapshot_tx, &store);

    loop {
        tokio::select! {
            event = rx_ingest.recv() => {
                match event {
                    Some(StoreEvent::Record(reading)) => {
                        match store.record_reading(reading, Utc::now().timestamp_millis()) {
                            Ok(commands) => dispatch_commands(commands, &tx_device, &mut store).await,
                            Err(e) => warn!("Warning: lectura rechazada. {e}"),
                        }
                    }
                    Some(StoreEvent::Confirm { actuator_id, reported, token }) => {
                        let now_ms = Utc::now().timestamp_millis();
                        if let Err(e) = store.confirm_actuator(&actuator_id, reported, token, now_ms) {
                            warn!("Warning: confirmación ignorada. {e}");
                        }
                    }
                    None => {
                        info!("Info: canal de ingesta cerrado, terminando store task");
                        return;
                    }
                }
            }
            request = rx_control.recv() => {
                match request {
                    Some(ControlRequest::Apply { actuator_id, desired, reply }) => {
                        let response = match store.apply_command(&actuator_id, desired, Utc::now().timestamp_millis()) {
                            Ok((token, command)) => {
                                dispatch_commands(vec![command], &tx_device, &mut store).await;
                                Ok(token)
                            }
                            Err(e) => Err(e),
                        };
                        if reply.send(response).is_err() {
                            warn!("Warning: el solicitante del comando ya no espera la respuesta");
                        }
                    }
                    Some(ControlRequest::EmergencyShutdown { reply }) => {
                        let (tokens, commands) = store.emergency_shutdown(Utc::now().timestamp_millis());
                        dispatch_commands(commands, &tx_device, &mut store).await;
                        if reply.send(Ok(tokens)).is_err() {
                            warn!("Warning: el solicitante del apagado ya no espera la respuesta");
                        }
                    }
                    Some(ControlRequest::HistorySince { since_ms, reply }) => {
                        if reply.send(store.history_since(since_ms)).is_err() {
                            warn!("Warning: el solicitante del historial ya no espera la respuesta");
                        }
                    }
                    None => {
                        info!("Info: canal de control cerrado, terminando store task");
                        return;
                    }
                }
            }
            tick = rx_tick.recv() => {
                match tick {
                    Some(tick) => store.on_tick(tick.at_ms),
                    None => {
                        info!("Info: canal de tick cerrado, terminando store task");
                        return;
                    }
                }
            }
        }
        publish_snapshot(&snapshot_tx, &store);
    }
}


/// Inicializa la tarea del almacén en segundo plano (tokio task).
pub fn start_store(rx_ingest: mpsc::Receiver<StoreEvent>,
                   rx_control: mpsc::Receiver<ControlRequest>,
                   rx_tick: mpsc::Receiver<Tick>,
                   tx_device: mpsc::Sender<DeviceCommand>,
                   snapshot_tx: watch::Sender<Arc<Snapshot>>,
                   app_context: AppContext) {

    info!("Info: iniciando tarea del almacén de monitoreo");
    tokio::spawn(async move {
        run_store(rx_ingest,
                  rx_control,
                  rx_tick,
                  tx_device,
                  snapshot_tx,
                  app_context,
        ).await;
    });
}
