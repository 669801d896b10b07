//! Cableado de los canales internos del servicio.
//!
//! Cada par emisor/receptor se crea una sola vez y se reparte entre las
//! tareas en `main.rs`. El snapshot viaja por un canal `watch`: los
//! consumidores leen la última versión publicada sin bloquear al almacén.


use std::sync::Arc;
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use crate::actuator::domain::DeviceCommand;
use crate::config::channels::{CONTROL, DEVICE, SENSOR, STORE, TICK};
use crate::store::domain::{ControlRequest, SensorMessage, Snapshot, StoreEvent};
use crate::tick::domain::Tick;


pub struct Channels {
    pub sensor_to_ingest: mpsc::Sender<SensorMessage>,
    pub ingest_from_sensor: mpsc::Receiver<SensorMessage>,

    pub ingest_to_store: mpsc::Sender<StoreEvent>,
    pub store_from_ingest: mpsc::Receiver<StoreEvent>,

    pub control_to_store: mpsc::Sender<ControlRequest>,
    pub store_from_control: mpsc::Receiver<ControlRequest>,

    pub tick_to_store: mpsc::Sender<Tick>,
    pub store_from_tick: mpsc::Receiver<Tick>,

    pub store_to_device: mpsc::Sender<DeviceCommand>,
    pub device_from_store: mpsc::Receiver<DeviceCommand>,

    pub snapshot_tx: watch::Sender<Arc<Snapshot>>,
    pub snapshot_rx: watch::Receiver<Arc<Snapshot>>,
}


impl Channels {
    pub fn new() -> Channels {
        let (sensor_to_in, in_from_sensor) = mpsc::channel::<SensorMessage>(SENSOR);
        let (in_to_store, store_from_in) = mpsc::channel::<StoreEvent>(STORE);
        let (ctl_to_store, store_from_ctl) = mpsc::channel::<ControlRequest>(CONTROL);
        let (tick_to_store, store_from_tick) = mpsc::channel::<Tick>(TICK);
        let (store_to_dev, dev_from_store) = mpsc::channel::<DeviceCommand>(DEVICE);
        let initial = Arc::new(Snapshot::empty(Utc::now().timestamp_millis()));
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);

        Self {
            sensor_to_ingest: sensor_to_in,
            ingest_from_sensor: in_from_sensor,
            ingest_to_store: in_to_store,
            store_from_ingest: store_from_in,
            control_to_store: ctl_to_store,
            store_from_control: store_from_ctl,
            tick_to_store,
            store_from_tick,
            store_to_device: store_to_dev,
            device_from_store: dev_from_store,
            snapshot_tx,
            snapshot_rx,
        }
    }
}
