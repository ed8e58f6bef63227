//! BLE GATT server for WBDiag frames
//!
//! Runs a GATT service with a single frame characteristic. Writes are parked
//! in shared state for the main loop to dispatch; responses go back out as
//! notifications on the same characteristic.
//!
//! Uses UUIDs from wbdiag_proto::ble.

use esp32_nimble::{
    utilities::{mutex::Mutex as NimbleMutex, BleUuid},
    uuid128, BLECharacteristic, BLEDevice, NimbleProperties,
};
use log::*;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};

use wbdiag_proto::ble::MAX_FRAME_LEN;

// These must match wbdiag_proto::ble::{SERVICE_UUID, FRAME_UUID}
const SERVICE_UUID: BleUuid = uuid128!("7e5d0000-8c1a-4b5e-9d6f-574244494147");
const FRAME_UUID: BleUuid = uuid128!("7e5d0001-8c1a-4b5e-9d6f-574244494147");

/// No central connected
pub const NO_CONNECTION: u16 = u16::MAX;

/// Connection handle of the current central, or `NO_CONNECTION`
pub static CONN_HANDLE: AtomicU16 = AtomicU16::new(NO_CONNECTION);

/// Shared state between BLE callbacks and main loop
pub struct BleState {
    pending: Option<Vec<u8>>,
}

/// Handles returned by `start_ble_server`
pub struct BleServer {
    pub state: Arc<Mutex<BleState>>,
    pub frame_char: Arc<NimbleMutex<BLECharacteristic>>,
}

/// Start the BLE GATT server and begin advertising
pub fn start_ble_server(device_name: &str) -> anyhow::Result<BleServer> {
    let state = Arc::new(Mutex::new(BleState { pending: None }));

    let ble_device = BLEDevice::take();
    BLEDevice::set_device_name(device_name)?;

    let server = ble_device.get_server();

    server.on_connect(|_server, desc| {
        info!("BLE client connected");
        CONN_HANDLE.store(desc.conn_handle(), Ordering::Relaxed);
    });

    server.on_disconnect(|_desc, _reason| {
        info!("BLE client disconnected");
        CONN_HANDLE.store(NO_CONNECTION, Ordering::Relaxed);
    });

    let service = server.create_service(SERVICE_UUID);

    // Frame characteristic (write / notify)
    let frame_state = state.clone();
    let frame_char = service.lock().create_characteristic(
        FRAME_UUID,
        NimbleProperties::WRITE | NimbleProperties::WRITE_NO_RSP | NimbleProperties::NOTIFY,
    );
    frame_char.lock().on_write(move |args| {
        let data = args.recv_data();
        if data.len() > MAX_FRAME_LEN {
            warn!("BLE: Dropping {} byte write", data.len());
            return;
        }
        if let Ok(mut s) = frame_state.lock() {
            // Single outstanding request: a newer write replaces an unhandled one.
            if s.pending.replace(data.to_vec()).is_some() {
                warn!("BLE: Request replaced before it was handled");
            }
        }
    });

    let advertising = ble_device.get_advertising();
    advertising.lock().set_data(
        esp32_nimble::BLEAdvertisementData::new()
            .name(device_name)
            .add_service_uuid(SERVICE_UUID),
    )?;
    advertising.lock().start()?;
    info!("BLE advertising started as '{}'", device_name);

    Ok(BleServer { state, frame_char })
}

/// Take the request written since the last call, if any
pub fn take_request(state: &Arc<Mutex<BleState>>) -> Option<Vec<u8>> {
    state.lock().ok()?.pending.take()
}
