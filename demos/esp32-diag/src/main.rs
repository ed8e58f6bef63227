//! WBDiag diagnostic firmware for ESP32
//!
//! Advertises a BLE GATT service and answers WBDiag request frames (RSSI,
//! firmware build, LED blink test, link status) with the shared dispatcher.
//!
//! Query it with the wbdiag-ble CLI.

mod ble;
mod board;

use esp_idf_svc::hal::{delay::FreeRtos, gpio::PinDriver, prelude::Peripherals};
use log::*;
use wbdiag_mcu::{Dispatcher, Outcome};

/// Main loop poll interval
const POLL_MS: u32 = 10;

fn main() -> anyhow::Result<()> {
    // Initialize ESP-IDF
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("WBDiag ESP32 v0.1");

    let peripherals = Peripherals::take()?;

    // GPIO2 is the built-in LED on most ESP32 dev boards
    let led = PinDriver::output(peripherals.pins.gpio2)?;
    info!("LED initialized on GPIO2");

    let server = ble::start_ble_server("WBDiag-ESP32")?;
    let mut dispatcher = Dispatcher::new(board::Esp32Board::new(led, server.frame_char));

    loop {
        if let Some(frame) = ble::take_request(&server.state) {
            match dispatcher.handle_frame(&frame) {
                Outcome::Sent(command) => info!("Answered {:?}", command),
                Outcome::Discarded(reason) => debug!("No response: {:?}", reason),
            }
        }
        FreeRtos::delay_ms(POLL_MS);
    }
}
