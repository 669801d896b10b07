use tracing::{error, info};
use crate::actuator::logic::ControlHandle;
use crate::channels::domain::Channels;
use crate::context::domain::AppContext;
use crate::device::logic::{start_device, start_sensor_feed};
use crate::ingest::logic::{start_ingest};
use crate::store::logic::{start_store};
use crate::system::domain::{init_tracing, System};
use crate::tick::domain::{start_tick};
use crate::view::logic::{start_dashboard_feed};

mod config;
mod actuator {
    pub mod domain;
    pub mod logic;
}
mod alerts {
    pub mod domain;
    pub mod logic;
}
mod channels {
    pub mod domain;
}
mod compliance {
    pub mod domain;
    pub mod logic;
}
mod context {
    pub mod domain;
}
mod device {
    pub mod logic;
}
mod ingest {
    pub mod logic;
}
mod store {
    pub mod domain;
    pub mod logic;
}
mod system {
    pub mod domain;
}
mod tick {
    pub mod domain;
}
mod view {
    pub mod logic;
}


#[tokio::main]
async fn main() {

    let system = System::new();
    init_tracing(&system);

    let channels = Channels::new();
    let app_context = AppContext::new(system);

    start_ingest(channels.ingest_to_store,
                 channels.ingest_from_sensor);

    start_tick(channels.tick_to_store,
               app_context.system.tick_interval_ms);

    start_store(channels.store_from_ingest,
                channels.store_from_control,
                channels.store_from_tick,
                channels.store_to_device,
                channels.snapshot_tx,
                app_context.clone());

    start_device(channels.device_from_store,
                 channels.sensor_to_ingest.clone(),
                 app_context.clone());

    start_sensor_feed(channels.sensor_to_ingest,
                      app_context.clone());

    start_dashboard_feed(channels.snapshot_rx);

    // La capa de vistas entra al almacén por esta fachada
    let control = ControlHandle::new(channels.control_to_store);

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Info: señal de apagado recibida"),
        Err(e) => error!("Error: no se pudo escuchar la señal de apagado. {e}"),
    }

    // Antes de salir se fuerza todo actuador a Off
    match control.emergency_shutdown().await {
        Ok(tokens) => info!("Info: apagado de emergencia emitido, {} comandos", tokens.len()),
        Err(e) => error!("Error: fallo el apagado de emergencia. {e}"),
    }
}
