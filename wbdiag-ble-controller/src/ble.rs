//! BLE client for WBDiag devices
//!
//! Provides functions to scan for WBDiag devices and run diagnostic commands
//! over the frame characteristic.

use std::pin::Pin;
use std::time::Duration;

use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, ValueNotification,
    WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::{Stream, StreamExt};
use log::{debug, info};
use uuid::Uuid;

use wbdiag_proto::ble::{DEVICE_NAME_PREFIX, FRAME_UUID};
use wbdiag_proto::{Command, FirmwareBuild, Request, Response};

use crate::exchange::{await_response, drain_pending};
use crate::ControllerError;

/// Default time to wait for a response
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// How long `find_device` scans before giving up
const FIND_SCAN_SECS: u64 = 5;

/// A discovered BLE device
#[derive(Debug, Clone, serde::Serialize)]
pub struct DiagDevice {
    pub name: String,
    pub address: String,
    pub rssi: Option<i16>,
    pub is_wbdiag: bool,
}

/// Parse UUID string into uuid::Uuid
fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).expect("invalid UUID in wbdiag_proto")
}

/// Match the advertised "WBDiag-xxx" name, also when a stack wraps it in brackets
fn is_wbdiag_name(name: &str) -> bool {
    name.starts_with(DEVICE_NAME_PREFIX) || name.contains(&format!("[{DEVICE_NAME_PREFIX}"))
}

/// Get the default Bluetooth adapter
pub async fn get_adapter() -> Result<Adapter, ControllerError> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    adapters.into_iter().next().ok_or(ControllerError::NoAdapter)
}

/// Scan for `duration_secs` and return every peripheral that reported properties
async fn discover(
    adapter: &Adapter,
    duration_secs: u64,
) -> Result<Vec<(Peripheral, DiagDevice)>, ControllerError> {
    adapter.start_scan(ScanFilter::default()).await?;
    tokio::time::sleep(Duration::from_secs(duration_secs)).await;

    let mut found = Vec::new();
    for peripheral in adapter.peripherals().await? {
        if let Some(props) = peripheral.properties().await? {
            let name = props.local_name.unwrap_or_else(|| "Unknown".to_string());
            let device = DiagDevice {
                is_wbdiag: is_wbdiag_name(&name),
                address: peripheral.address().to_string(),
                rssi: props.rssi,
                name,
            };
            found.push((peripheral, device));
        }
    }

    adapter.stop_scan().await?;
    debug!("Scan saw {} device(s)", found.len());
    Ok(found)
}

impl DiagDevice {
    /// Whether this device is the one `target` names. With no target, any
    /// WBDiag device matches.
    fn matches(&self, target: Option<&str>) -> bool {
        match target {
            Some(t) => self.name.contains(t) || self.address.contains(t),
            None => self.is_wbdiag,
        }
    }
}

/// Scan for BLE devices
///
/// Returns every device seen. WBDiag devices have `is_wbdiag = true`.
pub async fn scan(duration_secs: u64) -> Result<Vec<DiagDevice>, ControllerError> {
    let adapter = get_adapter().await?;
    let found = discover(&adapter, duration_secs).await?;
    Ok(found.into_iter().map(|(_, device)| device).collect())
}

/// Find a device by name/address pattern, or the first WBDiag device
pub async fn find_device(target: Option<&str>) -> Result<Peripheral, ControllerError> {
    let adapter = get_adapter().await?;
    let (peripheral, device) = discover(&adapter, FIND_SCAN_SECS)
        .await?
        .into_iter()
        .find(|(_, device)| device.matches(target))
        .ok_or(ControllerError::DeviceNotFound)?;

    info!("Found device: {} ({})", device.name, device.address);
    Ok(peripheral)
}

type Notifications = Pin<Box<dyn Stream<Item = ValueNotification> + Send>>;

/// A connected WBDiag device with notifications enabled on its frame characteristic
pub struct DiagClient {
    device: Peripheral,
    frame_char: Characteristic,
    notifications: Notifications,
    timeout: Duration,
}

impl DiagClient {
    /// Connect to a device and subscribe to response frames
    ///
    /// # Arguments
    /// * `target` - Device name/address pattern, or None to find any WBDiag device
    /// * `timeout` - How long each request waits for its response
    pub async fn connect(target: Option<&str>, timeout: Duration) -> Result<Self, ControllerError> {
        let device = find_device(target).await?;

        device.connect().await?;
        device.discover_services().await?;

        let frame_uuid = parse_uuid(FRAME_UUID);
        let frame_char = device
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == frame_uuid)
            .ok_or(ControllerError::CharacteristicNotFound("frame"))?;

        device.subscribe(&frame_char).await?;
        let notifications = device.notifications().await?;
        debug!("Subscribed to {}", frame_uuid);

        Ok(Self {
            device,
            frame_char,
            notifications,
            timeout,
        })
    }

    /// Send one request and wait for its response.
    ///
    /// The protocol allows a single outstanding request, so this takes `&mut self`.
    pub async fn request(&mut self, command: Command) -> Result<Response, ControllerError> {
        drain_pending(&mut self.notifications);

        let frame = Request::new(command).to_bytes();
        debug!("-> {:02x?}", frame);
        self.device
            .write(&self.frame_char, &frame, WriteType::WithResponse)
            .await?;

        let frame_uuid = self.frame_char.uuid;
        let frames = (&mut self.notifications)
            .filter_map(move |n| futures::future::ready((n.uuid == frame_uuid).then_some(n.value)));
        let mut frames = std::pin::pin!(frames);
        await_response(&mut frames, command, self.timeout).await
    }

    pub async fn signal_strength(&mut self) -> Result<i8, ControllerError> {
        match self.request(Command::GetSignalStrength).await? {
            Response::SignalStrength { rssi } => Ok(rssi),
            other => Err(ControllerError::UnexpectedResponse(other)),
        }
    }

    /// The build is returned whatever its status; check `FirmwareBuild::is_success`.
    pub async fn firmware_build(&mut self) -> Result<FirmwareBuild, ControllerError> {
        match self.request(Command::GetFirmwareBuild).await? {
            Response::FirmwareBuild(fw) => Ok(fw),
            other => Err(ControllerError::UnexpectedResponse(other)),
        }
    }

    /// Blink the indicator. The device answers after the blinking is done.
    pub async fn indicator_test(&mut self) -> Result<bool, ControllerError> {
        match self.request(Command::IndicatorTest).await? {
            Response::IndicatorTest { ok } => Ok(ok),
            other => Err(ControllerError::UnexpectedResponse(other)),
        }
    }

    pub async fn link_status(&mut self) -> Result<u8, ControllerError> {
        match self.request(Command::GetLinkStatus).await? {
            Response::LinkStatus { status } => Ok(status),
            other => Err(ControllerError::UnexpectedResponse(other)),
        }
    }

    pub async fn disconnect(self) -> Result<(), ControllerError> {
        self.device.disconnect().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wbdiag_names() {
        assert!(is_wbdiag_name("WBDiag-1a2b"));
        assert!(is_wbdiag_name("nimble [WBDiag-1a2b]"));
        assert!(!is_wbdiag_name("Keyboard K380"));
    }

    fn device(name: &str, address: &str) -> DiagDevice {
        DiagDevice {
            name: name.to_string(),
            address: address.to_string(),
            rssi: None,
            is_wbdiag: is_wbdiag_name(name),
        }
    }

    #[test]
    fn target_matches_name_or_address() {
        let dev = device("WBDiag-1a2b", "AA:BB:CC:DD:EE:FF");
        assert!(dev.matches(Some("1a2b")));
        assert!(dev.matches(Some("EE:FF")));
        assert!(!dev.matches(Some("K380")));
    }

    #[test]
    fn no_target_matches_only_wbdiag_devices() {
        assert!(device("WBDiag-1a2b", "AA:BB:CC:DD:EE:FF").matches(None));
        assert!(!device("Keyboard K380", "11:22:33:44:55:66").matches(None));
        // Unnamed peripherals are reported as "Unknown" and never picked by default
        assert!(!device("Unknown", "11:22:33:44:55:66").matches(None));
    }

    #[test]
    fn frame_uuid_parses() {
        assert_eq!(
            parse_uuid(FRAME_UUID),
            Uuid::from_u128(0x7e5d0001_8c1a_4b5e_9d6f_574244494147)
        );
    }
}
