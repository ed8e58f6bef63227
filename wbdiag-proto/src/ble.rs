//! BLE GATT identifiers for the WBDiag diagnostic service
//!
//! A single characteristic carries both directions: the host writes request
//! frames to it and the device notifies response frames on it. Requests and
//! responses use different preambles so a host can tell an echo of its own
//! write from a real answer.

/// BLE Service UUID: 7e5d0000-8c1a-4b5e-9d6f-574244494147
pub const SERVICE_UUID: &str = "7e5d0000-8c1a-4b5e-9d6f-574244494147";

/// Frame Characteristic UUID (write / write without response / notify)
pub const FRAME_UUID: &str = "7e5d0001-8c1a-4b5e-9d6f-574244494147";

/// Advertised name prefix of WBDiag devices
pub const DEVICE_NAME_PREFIX: &str = "WBDiag";

/// Largest frame the characteristic accepts in one write
pub const MAX_FRAME_LEN: usize = 20;
