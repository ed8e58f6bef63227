//! Matching notified frames to an outstanding request
//!
//! The device never reports errors: a rejected request or a failed read simply
//! produces no response. The host's only signal is the timeout here.

use std::time::Duration;

use futures::{FutureExt, Stream, StreamExt};
use log::{debug, trace};
use wbdiag_proto::{Command, FrameError, Response, REQUEST_PREAMBLE};

use crate::ControllerError;

/// Discard frames that are already buffered on `notifications`.
///
/// Called before writing a request, so a late reply to an earlier request
/// that timed out cannot be taken as the answer to the new one. Returns the
/// number of frames dropped.
pub fn drain_pending<S>(notifications: &mut S) -> usize
where
    S: Stream + Unpin,
{
    let mut dropped = 0;
    while let Some(Some(_)) = notifications.next().now_or_never() {
        dropped += 1;
    }
    if dropped > 0 {
        debug!("Dropped {} stale notification(s)", dropped);
    }
    dropped
}

/// Wait for the response to `command` on a stream of notified frames.
///
/// Echoes of the request, undecodable frames and responses to other commands
/// are skipped.
pub async fn await_response<S>(
    notifications: &mut S,
    command: Command,
    timeout: Duration,
) -> Result<Response, ControllerError>
where
    S: Stream<Item = Vec<u8>> + Unpin,
{
    let wait = async {
        while let Some(data) = notifications.next().await {
            match Response::from_bytes(&data) {
                Ok(response) if response.command() == command => return Ok(response),
                Ok(response) => debug!(
                    "Ignoring {:?} response while waiting for {:?}",
                    response.command(),
                    command
                ),
                Err(FrameError::BadPreamble(REQUEST_PREAMBLE)) => {
                    trace!("Ignoring request echo {:02x?}", data)
                }
                Err(e) => debug!("Ignoring notification {:02x?}: {}", data, e),
            }
        }
        Err(ControllerError::NotificationsClosed)
    };

    tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| ControllerError::Timeout(timeout))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;
    use futures::stream;

    const TIMEOUT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn returns_matching_response() {
        let mut frames = stream::iter(vec![vec![0xBB, 0x01, 0xC4]]);
        let response = await_response(&mut frames, Command::GetSignalStrength, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(response, Response::SignalStrength { rssi: -60 });
    }

    #[tokio::test]
    async fn skips_echoes_garbage_and_other_commands() {
        let mut frames = stream::iter(vec![
            vec![0xAA, 0x04],
            vec![0xBB, 0x04, 0x02, 0x00],
            vec![0xBB, 0x01, 0xC4],
            vec![0xBB, 0x04, 0x02],
        ]);
        let response = await_response(&mut frames, Command::GetLinkStatus, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(response, Response::LinkStatus { status: 2 });
    }

    #[tokio::test]
    async fn reports_closed_stream() {
        let mut frames = stream::iter(vec![vec![0xAA, 0x01]]);
        let err = await_response(&mut frames, Command::GetSignalStrength, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::NotificationsClosed));
    }

    #[tokio::test]
    async fn times_out_when_device_stays_silent() {
        let mut frames = stream::pending::<Vec<u8>>();
        let err = await_response(&mut frames, Command::GetFirmwareBuild, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::Timeout(t) if t == TIMEOUT));
    }

    #[tokio::test]
    async fn late_reply_to_earlier_request_is_not_returned() {
        let (tx, mut frames) = mpsc::unbounded::<Vec<u8>>();
        // Reply to a previous GetSignalStrength that already timed out.
        tx.unbounded_send(vec![0xBB, 0x01, 0xB0]).unwrap();

        assert_eq!(drain_pending(&mut frames), 1);
        tx.unbounded_send(vec![0xBB, 0x01, 0xC4]).unwrap();

        let response = await_response(&mut frames, Command::GetSignalStrength, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(response, Response::SignalStrength { rssi: -60 });
    }

    #[tokio::test]
    async fn drain_leaves_empty_stream_open() {
        let (tx, mut frames) = mpsc::unbounded::<Vec<u8>>();
        assert_eq!(drain_pending(&mut frames), 0);

        tx.unbounded_send(vec![0xBB, 0x04, 0x02]).unwrap();
        let response = await_response(&mut frames, Command::GetLinkStatus, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(response, Response::LinkStatus { status: 2 });
    }
}
