//! Capa de dispositivos simulada y alimentación del sensor de demostración.
//!
//! La capa física es un colaborador externo; esta simulación permite correr
//! el binario de punta a punta. El dispositivo confirma cada comando con una
//! latencia fija y puede descartar una confirmación cada N comandos para
//! ejercitar el camino de vencimiento. La onda del sensor es determinista,
//! cruza el límite de partículas en ambas direcciones sin depender de un
//! generador aleatorio.


use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, Duration};
use tracing::{error, info, warn};
use crate::actuator::domain::{DeviceCommand, SwitchState};
use crate::config::simulation::CONFIRM_LATENCY;
use crate::context::domain::AppContext;
use crate::store::domain::{ActuatorFrame, Reading, SensorMessage};


/// Lectura sintética del paso `step` de la onda de demostración.
///
/// La concentración oscila alrededor del límite por defecto de 500 pts/L,
/// el resto de las magnitudes se mantiene dentro de rango físico.
pub fn synthetic_reading(timestamp_ms: i64, step: u64) -> Reading {
    let phase = (step as f64 * 0.25).sin();
    Reading {
        timestamp_ms,
        confidence: 90.0 + 5.0 * phase,
        particle_count: (450.0 + 420.0 * phase).max(0.0),
        avg_size_um: 120.0 + 30.0 * phase,
        turbidity_ntu: 4.0 + 1.5 * phase,
        ph: 7.2 + 0.3 * phase,
        temperature_c: 21.0 + 2.0 * phase,
        tds_ppm: 180.0 + 20.0 * phase,
    }
}


pub async fn device_layer(mut rx_commands: mpsc::Receiver<DeviceCommand>,
                          tx_telemetry: mpsc::Sender<SensorMessage>,
                          drop_every: u64) {

    let mut processed: u64 = 0;
    while let Some(command) = rx_commands.recv().await {
        processed += 1;
        if drop_every > 0 && processed % drop_every == 0 {
            warn!("Warning: simulación descarta la confirmación del comando {} para {}",
                  command.token.0, command.actuator_id);
            continue;
        }
        sleep(CONFIRM_LATENCY).await;
        let reported = match command.desired {
            SwitchState::On => "on",
            SwitchState::Off => "off",
        };
        let frame = ActuatorFrame {
            actuator_id: command.actuator_id,
            reported: reported.to_string(),
            token: Some(command.token.0),
        };
        if tx_telemetry.send(SensorMessage::Actuator(frame)).await.is_err() {
            error!("Error: no se pudo enviar la confirmación simulada");
            return;
        }
    }
}


pub async fn sensor_feed(tx_telemetry: mpsc::Sender<SensorMessage>, interval_ms: i64) {
    let mut timer = interval(Duration::from_millis(interval_ms.max(1) as u64));
    let mut step: u64 = 0;
    loop {
        timer.tick().await;
        let reading = synthetic_reading(Utc::now().timestamp_millis(), step);
        if tx_telemetry.send(SensorMessage::Reading(reading)).await.is_err() {
            error!("Error: no se pudo enviar la lectura simulada");
            return;
        }
        step += 1;
    }
}


pub fn start_device(rx_commands: mpsc::Receiver<DeviceCommand>,
                    tx_telemetry: mpsc::Sender<SensorMessage>,
                    app_context: AppContext) {

    info!("Info: iniciando capa de dispositivos simulada");
    tokio::spawn(async move {
        device_layer(rx_commands,
                     tx_telemetry,
                     app_context.system.sim_drop_every,
        ).await;
    });
}


pub fn start_sensor_feed(tx_telemetry: mpsc::Sender<SensorMessage>,
                         app_context: AppContext) {

    info!("Info: iniciando sensor simulado");
    tokio::spawn(async move {
        sensor_feed(tx_telemetry,
                    app_context.system.sensor_interval_ms,
        ).await;
    });
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::domain::CommandToken;

    fn command(token: u64, desired: SwitchState) -> DeviceCommand {
        DeviceCommand {
            actuator_id: "pump-filtration".to_string(),
            desired,
            token: CommandToken(token),
            priority: false,
        }
    }

    #[test]
    fn la_onda_sintetica_siempre_pasa_la_validacion() {
        for step in 0..200 {
            let reading = synthetic_reading(step as i64 + 1, step);
            assert!(reading.validate().is_ok(), "paso {step} inválido");
        }
    }

    #[test]
    fn la_onda_sintetica_cruza_el_limite_de_particulas() {
        let counts: Vec<f64> = (0..100)
            .map(|step| synthetic_reading(step as i64 + 1, step).particle_count)
            .collect();
        assert!(counts.iter().any(|count| *count > 500.0));
        assert!(counts.iter().any(|count| *count < 500.0));
    }

    #[tokio::test]
    async fn cada_comando_se_confirma_con_su_token() {
        let (tx_cmd, rx_cmd) = mpsc::channel(10);
        let (tx_tel, mut rx_tel) = mpsc::channel(10);
        tokio::spawn(device_layer(rx_cmd, tx_tel, 0));

        tx_cmd.send(command(5, SwitchState::On)).await.unwrap();
        match rx_tel.recv().await.unwrap() {
            SensorMessage::Actuator(frame) => {
                assert_eq!(frame.actuator_id, "pump-filtration");
                assert_eq!(frame.reported, "on");
                assert_eq!(frame.token, Some(5));
            }
            other => panic!("se esperaba un reporte de actuador, llegó {other:?}"),
        }
    }

    #[tokio::test]
    async fn el_descarte_configurado_omite_cada_n_confirmaciones() {
        let (tx_cmd, rx_cmd) = mpsc::channel(10);
        let (tx_tel, mut rx_tel) = mpsc::channel(10);
        tokio::spawn(device_layer(rx_cmd, tx_tel, 2));

        // El segundo comando pierde su confirmación
        tx_cmd.send(command(1, SwitchState::On)).await.unwrap();
        tx_cmd.send(command(2, SwitchState::Off)).await.unwrap();
        tx_cmd.send(command(3, SwitchState::On)).await.unwrap();
        drop(tx_cmd);

        let mut tokens = Vec::new();
        while let Some(SensorMessage::Actuator(frame)) = rx_tel.recv().await {
            tokens.push(frame.token);
        }
        assert_eq!(tokens, vec![Some(1), Some(3)]);
    }
}
