//! Temporizador del tick de evaluación.
//!
//! El servicio es dirigido por sondeo: la pérdida de señal del sensor y el
//! vencimiento de comandos se revisan en cada tick contra el reloj de pared,
//! nunca con esperas bloqueantes. Eso mantiene la detección de fallas
//! determinista y testeable con timestamps inyectados.


use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::info;


/// Marca de tiempo de una ronda de evaluación.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub at_ms: i64,
}


pub async fn evaluation_timer(tx_to_store: mpsc::Sender<Tick>, interval_ms: i64) {
    let mut timer = interval(Duration::from_millis(interval_ms.max(1) as u64));
    loop {
        timer.tick().await;
        let tick = Tick { at_ms: Utc::now().timestamp_millis() };
        if tx_to_store.send(tick).await.is_err() {
            // Almacén terminado, no queda a quién despertar
            break;
        }
    }
}


pub fn start_tick(tx_to_store: mpsc::Sender<Tick>, interval_ms: i64) {

    info!("Info: iniciando temporizador de evaluación cada {interval_ms} ms");
    tokio::spawn(async move {
        evaluation_timer(tx_to_store, interval_ms).await;
    });
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn el_temporizador_entrega_ticks_con_marca_creciente() {
        let (tx, mut rx) = mpsc::channel::<Tick>(10);
        start_tick(tx, 1);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(second.at_ms >= first.at_ms);
    }

    #[tokio::test]
    async fn el_temporizador_termina_cuando_el_receptor_se_cierra() {
        let (tx, rx) = mpsc::channel::<Tick>(1);
        let task = tokio::spawn(evaluation_timer(tx, 1));
        drop(rx);
        task.await.unwrap();
    }
}
