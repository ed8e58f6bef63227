//! Request frame dispatcher
//!
//! Validates an inbound frame, runs the matching command against the board and
//! hands exactly one response frame to the transport. Every rejected frame and
//! every failed capability read ends the same way: nothing is sent, and the
//! host is left to time out and retry.

use log::{debug, trace};
use wbdiag_proto::{Command, FrameError, Request, Response};

use crate::capability::Capabilities;

/// Tunables for the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Full on/off cycles performed by IndicatorTest
    pub blink_cycles: u8,
    /// Delay after each indicator toggle
    pub blink_delay_ms: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            blink_cycles: 3,
            blink_delay_ms: 150,
        }
    }
}

/// Why a frame produced no response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discard {
    /// Too short or wrong preamble
    Malformed(FrameError),
    UnknownCommand(u8),
    /// The board could not produce a value for the command
    CapabilityFailed(Command),
}

/// What `Dispatcher::handle_frame` did with a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Sent(Command),
    Discarded(Discard),
}

impl Outcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Outcome::Sent(_))
    }
}

pub struct Dispatcher<C> {
    caps: C,
    config: DispatcherConfig,
}

impl<C: Capabilities> Dispatcher<C> {
    pub fn new(caps: C) -> Self {
        Self::with_config(caps, DispatcherConfig::default())
    }

    pub fn with_config(caps: C, config: DispatcherConfig) -> Self {
        Self { caps, config }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &C {
        &self.caps
    }

    pub fn capabilities_mut(&mut self) -> &mut C {
        &mut self.caps
    }

    pub fn into_inner(self) -> C {
        self.caps
    }

    /// Handle one frame received from the transport.
    ///
    /// `data` is only borrowed for the duration of the call. Taking `&mut self`
    /// keeps a second frame from being dispatched while one is in flight.
    pub fn handle_frame(&mut self, data: &[u8]) -> Outcome {
        let request = match Request::parse(data) {
            Ok(request) => request,
            Err(FrameError::UnknownCommand(cmd)) => {
                trace!("Ignoring unknown command 0x{:02x}", cmd);
                return Outcome::Discarded(Discard::UnknownCommand(cmd));
            }
            Err(e) => {
                trace!("Dropping frame: {}", e);
                return Outcome::Discarded(Discard::Malformed(e));
            }
        };

        let command = request.command;
        let response = match command {
            Command::GetSignalStrength => self.signal_strength(),
            Command::GetFirmwareBuild => Some(self.firmware_build()),
            Command::IndicatorTest => Some(self.indicator_test()),
            Command::GetLinkStatus => self.link_status(),
        };

        let Some(response) = response else {
            return Outcome::Discarded(Discard::CapabilityFailed(command));
        };

        let frame = response.encode();
        self.caps.send_frame(frame.as_bytes());
        trace!("{:?} -> {:02x?}", command, frame.as_bytes());
        Outcome::Sent(command)
    }

    fn signal_strength(&mut self) -> Option<Response> {
        match self.caps.read_rssi() {
            Ok(rssi) => Some(Response::SignalStrength { rssi }),
            Err(e) => {
                debug!("RSSI read failed: {}", e);
                None
            }
        }
    }

    fn firmware_build(&mut self) -> Response {
        Response::FirmwareBuild(self.caps.firmware_build())
    }

    fn indicator_test(&mut self) -> Response {
        for _ in 0..self.config.blink_cycles {
            // on, then off
            for _ in 0..2 {
                self.caps.toggle();
                self.caps.delay_ms(self.config.blink_delay_ms);
            }
        }
        Response::IndicatorTest { ok: true }
    }

    fn link_status(&mut self) -> Option<Response> {
        let link = match self.caps.read_link_status() {
            Ok(link) => link,
            Err(e) => {
                debug!("Link status read failed: {}", e);
                return None;
            }
        };
        // Only slot 0 goes on the wire; note anything else that is active.
        for (slot, status, handle) in link.secondary_links() {
            debug!(
                "Link slot {} not reported: status=0x{:02x} handle=0x{:04x}",
                slot, status, handle
            );
        }
        Some(Response::LinkStatus {
            status: link.primary(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{FirmwareBuild, LinkStatus};
    use crate::sim::SimBoard;

    fn dispatch(board: SimBoard, frame: &[u8]) -> (Outcome, SimBoard) {
        let mut dispatcher = Dispatcher::new(board);
        let outcome = dispatcher.handle_frame(frame);
        (outcome, dispatcher.into_inner())
    }

    #[test]
    fn short_frames_send_nothing() {
        for frame in [&[][..], &[0xAA][..], &[0x01][..]] {
            let (outcome, board) = dispatch(SimBoard::new(), frame);
            assert!(matches!(
                outcome,
                Outcome::Discarded(Discard::Malformed(FrameError::TooShort { .. }))
            ));
            assert!(board.sent.is_empty());
        }
    }

    #[test]
    fn wrong_preamble_sends_nothing() {
        for first in [0x00, 0xAB, 0xBB, 0xFF] {
            let (outcome, board) = dispatch(SimBoard::new(), &[first, 0x03, 0, 0]);
            assert_eq!(
                outcome,
                Outcome::Discarded(Discard::Malformed(FrameError::BadPreamble(first)))
            );
            assert!(board.sent.is_empty());
            assert_eq!(board.toggles, 0);
        }
    }

    #[test]
    fn unknown_command_sends_nothing() {
        for cmd in [0x00, 0x05, 0x10, 0xFF] {
            let (outcome, board) = dispatch(SimBoard::new(), &[0xAA, cmd]);
            assert_eq!(outcome, Outcome::Discarded(Discard::UnknownCommand(cmd)));
            assert!(board.sent.is_empty());
        }
    }

    #[test]
    fn signal_strength() {
        let (outcome, board) = dispatch(SimBoard::new().with_rssi(-42), &[0xAA, 0x01]);
        assert_eq!(outcome, Outcome::Sent(Command::GetSignalStrength));
        assert_eq!(board.sent, vec![vec![0xBB, 0x01, (-42i8) as u8]]);
    }

    #[test]
    fn signal_strength_failure_sends_nothing() {
        let (outcome, board) = dispatch(SimBoard::new().failing_rssi(), &[0xAA, 0x01]);
        assert_eq!(
            outcome,
            Outcome::Discarded(Discard::CapabilityFailed(Command::GetSignalStrength))
        );
        assert!(board.sent.is_empty());
    }

    #[test]
    fn firmware_build() {
        let fw = FirmwareBuild {
            major: 1,
            minor: 2,
            patch: 3,
            status: 0,
        };
        let (outcome, board) = dispatch(SimBoard::new().with_firmware(fw), &[0xAA, 0x02]);
        assert_eq!(outcome, Outcome::Sent(Command::GetFirmwareBuild));
        assert_eq!(board.sent, vec![vec![0xBB, 0x02, 1, 2, 3, 0]]);
    }

    #[test]
    fn firmware_build_replies_even_when_query_failed() {
        let fw = FirmwareBuild {
            major: 1,
            minor: 2,
            patch: 3,
            status: 0xFF,
        };
        let (outcome, board) = dispatch(SimBoard::new().with_firmware(fw), &[0xAA, 0x02]);
        assert!(outcome.is_sent());
        assert_eq!(board.sent, vec![vec![0xBB, 0x02, 1, 2, 3, 0xFF]]);
    }

    #[test]
    fn indicator_test_blinks_three_times() {
        let (outcome, board) = dispatch(SimBoard::new(), &[0xAA, 0x03]);
        assert_eq!(outcome, Outcome::Sent(Command::IndicatorTest));
        assert_eq!(board.toggles, 6);
        assert_eq!(board.delays, vec![150; 6]);
        assert!(!board.indicator_on);
        assert_eq!(board.sent, vec![vec![0xBB, 0x03, 1]]);
    }

    #[test]
    fn indicator_test_follows_config() {
        let config = DispatcherConfig {
            blink_cycles: 1,
            blink_delay_ms: 20,
        };
        let mut dispatcher = Dispatcher::with_config(SimBoard::new(), config);
        dispatcher.handle_frame(&[0xAA, 0x03]);
        let board = dispatcher.into_inner();
        assert_eq!(board.toggles, 2);
        assert_eq!(board.delays, vec![20, 20]);
    }

    #[test]
    fn link_status_reports_first_slot_only() {
        let mut link = LinkStatus::single(7, 0x0801);
        link.status[1] = 2;
        let (outcome, board) = dispatch(SimBoard::new().with_link(link), &[0xAA, 0x04]);
        assert_eq!(outcome, Outcome::Sent(Command::GetLinkStatus));
        assert_eq!(board.sent, vec![vec![0xBB, 0x04, 7]]);
    }

    #[test]
    fn link_status_failure_sends_nothing() {
        let (outcome, board) = dispatch(SimBoard::new().failing_link(), &[0xAA, 0x04]);
        assert_eq!(
            outcome,
            Outcome::Discarded(Discard::CapabilityFailed(Command::GetLinkStatus))
        );
        assert!(board.sent.is_empty());
    }

    #[test]
    fn payload_bytes_are_ignored() {
        let (outcome, board) = dispatch(SimBoard::new().with_rssi(-1), &[0xAA, 0x01, 9, 9, 9]);
        assert!(outcome.is_sent());
        assert_eq!(board.sent, vec![vec![0xBB, 0x01, 0xFF]]);
    }

    #[test]
    fn repeated_dispatches_do_not_share_state() {
        let mut dispatcher = Dispatcher::new(SimBoard::new().with_rssi(-70));
        dispatcher.handle_frame(&[0xAA, 0x02]);
        dispatcher.handle_frame(&[0xAA, 0x01]);
        dispatcher.handle_frame(&[0xAA, 0x01]);

        let sent = dispatcher.capabilities_mut().take_sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0], vec![0xBB, 0x02, 1, 13, 0, 0]);
        // No leftovers from the longer firmware response.
        assert_eq!(sent[1], vec![0xBB, 0x01, (-70i8) as u8]);
        assert_eq!(sent[1], sent[2]);
    }

    #[test]
    fn every_command_sends_its_documented_length() {
        let mut dispatcher = Dispatcher::new(SimBoard::new());
        for command in Command::ALL {
            assert!(dispatcher.handle_frame(&[0xAA, command as u8]).is_sent());
            let sent = dispatcher.capabilities_mut().take_sent();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].len(), command.response_len());
            assert_eq!(sent[0][0], 0xBB);
            assert_eq!(sent[0][1], command as u8);
        }
    }
}
