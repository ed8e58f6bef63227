//! WBDiag MCU Library
//!
//! Device side of the WBDiag diagnostic protocol.
//!
//! This crate provides:
//! - Capability traits a board implements (radio, firmware, indicator, delay, transport)
//! - The frame dispatcher that turns request frames into response frames
//! - A simulated board for running the dispatcher off-device
//!
//! # Example
//!
//! ```
//! use wbdiag_mcu::{sim::SimBoard, Dispatcher, Outcome};
//! use wbdiag_mcu::proto::Command;
//!
//! let mut dispatcher = Dispatcher::new(SimBoard::new().with_rssi(-55));
//! assert_eq!(dispatcher.handle_frame(&[0xAA, 0x01]), Outcome::Sent(Command::GetSignalStrength));
//! assert_eq!(dispatcher.capabilities().sent[0], vec![0xBB, 0x01, (-55i8) as u8]);
//! ```

pub mod capability;
pub mod dispatch;
pub mod sim;

pub use wbdiag_proto as proto;

pub use capability::*;
pub use dispatch::*;
