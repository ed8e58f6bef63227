//! WBDiag BLE Controller
//!
//! BLE client for running diagnostic commands on WBDiag devices.
//!
//! # Example
//!
//! ```ignore
//! use wbdiag_ble_controller::ble::{self, DiagClient, DEFAULT_TIMEOUT};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Scan for devices
//!     let devices = ble::scan(5).await?;
//!     for device in &devices {
//!         println!("{} ({})", device.name, device.address);
//!     }
//!
//!     // Query the first WBDiag device found
//!     let mut client = DiagClient::connect(None, DEFAULT_TIMEOUT).await?;
//!     println!("RSSI: {} dBm", client.signal_strength().await?);
//!     client.disconnect().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod ble;
mod error;
pub mod exchange;

pub use error::ControllerError;
pub use wbdiag_proto as proto;
