//! Board capability traits
//!
//! MCU-specific crates implement these on top of their radio stack and HAL.
//! The dispatcher only ever talks to the board through them.

pub use wbdiag_proto::FirmwareBuild;

/// Number of slots in the radio's link status table
pub const LINK_SLOTS: usize = 8;

/// Link status table as returned by the radio stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkStatus {
    pub status: [u8; LINK_SLOTS],
    pub handles: [u16; LINK_SLOTS],
}

impl LinkStatus {
    /// Link status with only the first slot populated
    pub fn single(status: u8, handle: u16) -> Self {
        let mut link = Self::default();
        link.status[0] = status;
        link.handles[0] = handle;
        link
    }

    /// Status of slot 0, the only one reported to the host
    pub fn primary(&self) -> u8 {
        self.status[0]
    }

    /// Slots 1.. that report a non-zero status, as `(slot, status, handle)`
    pub fn secondary_links(&self) -> impl Iterator<Item = (usize, u8, u16)> + '_ {
        self.status
            .iter()
            .zip(self.handles.iter())
            .enumerate()
            .skip(1)
            .filter(|(_, (status, _))| **status != 0)
            .map(|(slot, (status, handle))| (slot, *status, *handle))
    }
}

/// Trait for radio stack queries
pub trait Radio {
    /// Error type for radio operations
    type Error: core::fmt::Debug + core::fmt::Display;

    /// Read the RSSI of the current connection in dBm
    fn read_rssi(&mut self) -> Result<i8, Self::Error>;

    /// Read the link status table
    fn read_link_status(&mut self) -> Result<LinkStatus, Self::Error>;
}

/// Trait for the wireless firmware version query
pub trait Firmware {
    /// Query the wireless firmware build.
    ///
    /// Never fails: a failed query is reported through `FirmwareBuild::status`.
    fn firmware_build(&mut self) -> FirmwareBuild;
}

/// Trait for the visual indicator (LED)
pub trait Indicator {
    /// Flip the indicator state
    fn toggle(&mut self);
}

/// Trait for blocking delays
pub trait Delay {
    fn delay_ms(&mut self, ms: u32);
}

/// Trait for handing a response frame to the transport
///
/// Implementations copy or transmit `frame` before returning; the dispatcher
/// does not wait for delivery.
pub trait Transport {
    fn send_frame(&mut self, frame: &[u8]);
}

/// Everything the dispatcher needs from a board
pub trait Capabilities: Radio + Firmware + Indicator + Delay + Transport {}

impl<T: Radio + Firmware + Indicator + Delay + Transport> Capabilities for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secondary_links_skip_primary_and_idle_slots() {
        let mut link = LinkStatus::single(7, 0x0801);
        link.status[3] = 2;
        link.handles[3] = 0x0802;

        assert_eq!(link.primary(), 7);
        assert_eq!(link.secondary_links().collect::<Vec<_>>(), vec![(3, 2, 0x0802)]);
    }
}
