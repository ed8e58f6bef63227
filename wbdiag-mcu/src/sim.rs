//! In-memory board for host-side runs and tests
//!
//! Every capability is backed by a plain field. Side effects (toggles, delays,
//! sent frames) are recorded instead of performed.

use crate::capability::{Delay, Firmware, FirmwareBuild, Indicator, LinkStatus, Radio, Transport};

/// Link status code for "connected as peripheral"
pub const LINK_CONNECTED_PERIPHERAL: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    #[error("RSSI unavailable")]
    RssiUnavailable,
    #[error("link status unavailable")]
    LinkStatusUnavailable,
}

#[derive(Debug, Clone)]
pub struct SimBoard {
    pub rssi: Result<i8, SimError>,
    pub firmware: FirmwareBuild,
    pub link: Result<LinkStatus, SimError>,
    pub indicator_on: bool,
    pub toggles: usize,
    pub delays: Vec<u32>,
    pub sent: Vec<Vec<u8>>,
}

impl Default for SimBoard {
    fn default() -> Self {
        Self {
            rssi: Ok(-60),
            firmware: FirmwareBuild {
                major: 1,
                minor: 13,
                patch: 0,
                status: 0,
            },
            link: Ok(LinkStatus::single(LINK_CONNECTED_PERIPHERAL, 0x0801)),
            indicator_on: false,
            toggles: 0,
            delays: Vec::new(),
            sent: Vec::new(),
        }
    }
}

impl SimBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rssi(mut self, rssi: i8) -> Self {
        self.rssi = Ok(rssi);
        self
    }

    pub fn failing_rssi(mut self) -> Self {
        self.rssi = Err(SimError::RssiUnavailable);
        self
    }

    pub fn with_firmware(mut self, firmware: FirmwareBuild) -> Self {
        self.firmware = firmware;
        self
    }

    pub fn with_link(mut self, link: LinkStatus) -> Self {
        self.link = Ok(link);
        self
    }

    pub fn failing_link(mut self) -> Self {
        self.link = Err(SimError::LinkStatusUnavailable);
        self
    }

    /// Drain the frames sent so far
    pub fn take_sent(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.sent)
    }
}

impl Radio for SimBoard {
    type Error = SimError;

    fn read_rssi(&mut self) -> Result<i8, SimError> {
        self.rssi
    }

    fn read_link_status(&mut self) -> Result<LinkStatus, SimError> {
        self.link
    }
}

impl Firmware for SimBoard {
    fn firmware_build(&mut self) -> FirmwareBuild {
        self.firmware
    }
}

impl Indicator for SimBoard {
    fn toggle(&mut self) {
        self.indicator_on = !self.indicator_on;
        self.toggles += 1;
    }
}

impl Delay for SimBoard {
    fn delay_ms(&mut self, ms: u32) {
        self.delays.push(ms);
    }
}

impl Transport for SimBoard {
    fn send_frame(&mut self, frame: &[u8]) {
        self.sent.push(frame.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radio_failures_carry_readable_messages() {
        let mut board = SimBoard::new().failing_rssi().failing_link();
        let rssi = board.read_rssi().unwrap_err();
        let link = board.read_link_status().unwrap_err();
        assert_eq!(rssi.to_string(), "RSSI unavailable");
        assert_eq!(link.to_string(), "link status unavailable");
    }
}
