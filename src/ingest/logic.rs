//! Adaptador de ingesta de telemetría.
//!
//! Traduce los mensajes crudos del sensor y de los dispositivos al evento
//! tipado que entra al camino único de mutación del almacén. Un reporte de
//! actuador con estado ilegible se registra y se descarta, la ingesta nunca
//! detiene el flujo por un mensaje malformado.


use tokio::sync::mpsc;
use tracing::{error, info};
use crate::actuator::domain::{CommandToken, SwitchState};
use crate::store::domain::{ActuatorFrame, SensorMessage, StoreEvent};


fn parse_reported(raw: &str) -> Option<SwitchState> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "on" => Some(SwitchState::On),
        "off" => Some(SwitchState::Off),
        _ => None,
    }
}


fn translate(frame: ActuatorFrame) -> Option<StoreEvent> {
    match parse_reported(&frame.reported) {
        Some(reported) => Some(StoreEvent::Confirm {
            actuator_id: frame.actuator_id,
            reported,
            token: frame.token.map(CommandToken),
        }),
        None => {
            error!("Error: estado reportado ilegible '{}' para {}, reporte descartado",
                   frame.reported, frame.actuator_id);
            None
        }
    }
}


pub async fn ingest_adapter(tx_to_store: mpsc::Sender<StoreEvent>,
                            mut rx_from_sensor: mpsc::Receiver<SensorMessage>) {

    while let Some(message) = rx_from_sensor.recv().await {
        let event = match message {
            SensorMessage::Reading(reading) => Some(StoreEvent::Record(reading)),
            SensorMessage::Actuator(frame) => translate(frame),
        };
        if let Some(event) = event {
            if tx_to_store.send(event).await.is_err() {
                error!("Error: no se pudo enviar el evento al almacén");
                return;
            }
        }
    }
}


pub fn start_ingest(tx_to_store: mpsc::Sender<StoreEvent>,
                    rx_from_sensor: mpsc::Receiver<SensorMessage>) {

    info!("Info: iniciando adaptador de ingesta");
    tokio::spawn(async move {
        ingest_adapter(tx_to_store,
                       rx_from_sensor
        ).await;
    });
}
