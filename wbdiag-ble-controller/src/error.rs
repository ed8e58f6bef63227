use std::time::Duration;

use wbdiag_proto::FrameError;

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("bluetooth error: {0}")]
    Btle(#[from] btleplug::Error),
    #[error("no Bluetooth adapter found")]
    NoAdapter,
    #[error("no WBDiag device found")]
    DeviceNotFound,
    #[error("{0} characteristic not found")]
    CharacteristicNotFound(&'static str),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("notification stream closed")]
    NotificationsClosed,
    #[error("unexpected response: {0:?}")]
    UnexpectedResponse(wbdiag_proto::Response),
    #[error(transparent)]
    Frame(#[from] FrameError),
}
