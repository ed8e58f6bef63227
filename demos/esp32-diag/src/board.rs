//! WBDiag capabilities backed by ESP-IDF and NimBLE

use esp32_nimble::{utilities::mutex::Mutex as NimbleMutex, BLECharacteristic};
use esp_idf_svc::hal::{
    delay::FreeRtos,
    gpio::{Gpio2, Output, PinDriver},
};
use log::*;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use wbdiag_mcu::{Delay, Firmware, FirmwareBuild, Indicator, LinkStatus, Radio, Transport};

use crate::ble::{CONN_HANDLE, NO_CONNECTION};

// aci-style link status codes
const LINK_IDLE: u8 = 0x00;
const LINK_CONNECTED_PERIPHERAL: u8 = 0x02;

#[derive(Debug, thiserror::Error)]
pub enum RadioError {
    #[error("no central connected")]
    NotConnected,
    #[error("NimBLE call failed with rc {0}")]
    Nimble(i32),
}

pub struct Esp32Board {
    led: PinDriver<'static, Gpio2, Output>,
    frame_char: Arc<NimbleMutex<BLECharacteristic>>,
}

impl Esp32Board {
    pub fn new(
        led: PinDriver<'static, Gpio2, Output>,
        frame_char: Arc<NimbleMutex<BLECharacteristic>>,
    ) -> Self {
        Self { led, frame_char }
    }

    fn conn_handle(&self) -> Option<u16> {
        match CONN_HANDLE.load(Ordering::Relaxed) {
            NO_CONNECTION => None,
            handle => Some(handle),
        }
    }
}

impl Radio for Esp32Board {
    type Error = RadioError;

    fn read_rssi(&mut self) -> Result<i8, RadioError> {
        let handle = self.conn_handle().ok_or(RadioError::NotConnected)?;
        let mut rssi: i8 = 0;
        let rc = unsafe { esp_idf_svc::sys::ble_gap_conn_rssi(handle, &mut rssi) };
        if rc != 0 {
            return Err(RadioError::Nimble(rc));
        }
        Ok(rssi)
    }

    fn read_link_status(&mut self) -> Result<LinkStatus, RadioError> {
        // The server accepts a single central, so only slot 0 is ever used.
        Ok(match self.conn_handle() {
            Some(handle) => LinkStatus::single(LINK_CONNECTED_PERIPHERAL, handle),
            None => LinkStatus::single(LINK_IDLE, 0),
        })
    }
}

impl Firmware for Esp32Board {
    fn firmware_build(&mut self) -> FirmwareBuild {
        FirmwareBuild {
            major: esp_idf_svc::sys::ESP_IDF_VERSION_MAJOR as u8,
            minor: esp_idf_svc::sys::ESP_IDF_VERSION_MINOR as u8,
            patch: esp_idf_svc::sys::ESP_IDF_VERSION_PATCH as u8,
            status: 0,
        }
    }
}

impl Indicator for Esp32Board {
    fn toggle(&mut self) {
        if let Err(e) = self.led.toggle() {
            warn!("LED toggle failed: {:?}", e);
        }
    }
}

impl Delay for Esp32Board {
    fn delay_ms(&mut self, ms: u32) {
        FreeRtos::delay_ms(ms);
    }
}

impl Transport for Esp32Board {
    fn send_frame(&mut self, frame: &[u8]) {
        self.frame_char.lock().set_value(frame).notify();
    }
}
