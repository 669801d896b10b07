//! Dominio de actuadores y comandos hacia la capa de dispositivos.
//!
//! Define el estado dual comandado/confirmado de cada actuador, el token
//! opaco de comando y los mensajes salientes hacia los dispositivos. El
//! estado comandado puede divergir transitoriamente del confirmado mientras
//! un comando está en vuelo; la reconciliación ocurre al confirmar o al
//! vencer el plazo.


use serde::{Serialize, Deserialize};


/// Tipo físico del actuador desplegado.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActuatorKind {
    Valve,
    Pump,
    FiltrationUnit,
}


/// Estado binario que un operador puede comandar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SwitchState {
    On,
    Off,
}


/// Estado reportado por el dispositivo. `Unknown` indica que el último
/// comando venció sin confirmación o que el dispositivo aún no reportó.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConfirmedState {
    On,
    Off,
    Unknown,
}


impl From<SwitchState> for ConfirmedState {
    fn from(state: SwitchState) -> ConfirmedState {
        match state {
            SwitchState::On => ConfirmedState::On,
            SwitchState::Off => ConfirmedState::Off,
        }
    }
}


/// Token opaco y creciente que identifica un comando emitido.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommandToken(pub u64);


/// Estado operativo de un actuador del despliegue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActuatorState {
    pub id: String,
    pub kind: ActuatorKind,
    pub commanded: SwitchState,
    pub confirmed: ConfirmedState,
    pub last_changed_ms: i64,
}


/// Comando pendiente de confirmación.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingCommand {
    pub token: CommandToken,
    pub desired: SwitchState,
    pub issued_at_ms: i64,
}


/// Comando saliente hacia la capa de dispositivos.
///
/// `priority` distingue los comandos del apagado de emergencia.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceCommand {
    pub actuator_id: String,
    pub desired: SwitchState,
    pub token: CommandToken,
    pub priority: bool,
}


/// Resultado de procesar una confirmación, consumido por el almacén para
/// dirigir las transiciones de alertas.
#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct ConfirmOutcome {
    /// El reporte coincidió con el comando pendiente.
    pub reconciled: bool,
    /// El reporte contradijo el comando pendiente y el estado comandado
    /// se revirtió al reportado.
    pub rolled_back: bool,
    /// La unidad de filtrado pasó de encendida a apagada, fin de ciclo.
    pub cycle_completed: bool,
    /// La unidad de filtrado pasó de apagada a encendida, inicio de ciclo.
    pub cycle_started: bool,
}
