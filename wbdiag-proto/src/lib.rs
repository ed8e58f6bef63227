//! WBDiag wire protocol - diagnostic commands and framing
//!
//! Every field is a single byte, so there is no endianness to agree on.
//!
//! ```text
//! request:  [0xAA][cmd][payload...]      at least 2 bytes
//! response: [0xBB][cmd][result...]       fixed length per command
//! ```

pub mod ble;

/// First byte of every request frame (host -> device)
pub const REQUEST_PREAMBLE: u8 = 0xAA;
/// First byte of every response frame (device -> host)
pub const RESPONSE_PREAMBLE: u8 = 0xBB;

/// Preamble + command byte
pub const MIN_REQUEST_LEN: usize = 2;
/// Length of the largest response (GetFirmwareBuild)
pub const MAX_RESPONSE_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame too short: {len} bytes")]
    TooShort { len: usize },
    #[error("unexpected preamble 0x{0:02x}")]
    BadPreamble(u8),
    #[error("unknown command 0x{0:02x}")]
    UnknownCommand(u8),
    #[error("{command:?} response must be {expected} bytes, got {actual}")]
    LengthMismatch {
        command: Command,
        expected: usize,
        actual: usize,
    },
}

/// Diagnostic commands understood by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum Command {
    /// Read the RSSI of the current link
    GetSignalStrength = 0x01,
    /// Read the wireless stack firmware version
    GetFirmwareBuild = 0x02,
    /// Blink the indicator LED
    IndicatorTest = 0x03,
    /// Read the link status table
    GetLinkStatus = 0x04,
}

impl Command {
    pub const ALL: [Command; 4] = [
        Command::GetSignalStrength,
        Command::GetFirmwareBuild,
        Command::IndicatorTest,
        Command::GetLinkStatus,
    ];

    /// Total length of the response frame, preamble and command byte included
    pub const fn response_len(self) -> usize {
        match self {
            Command::GetSignalStrength => 3,
            Command::GetFirmwareBuild => 6,
            Command::IndicatorTest => 3,
            Command::GetLinkStatus => 3,
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Command::GetSignalStrength),
            0x02 => Ok(Command::GetFirmwareBuild),
            0x03 => Ok(Command::IndicatorTest),
            0x04 => Ok(Command::GetLinkStatus),
            _ => Err(value),
        }
    }
}

/// A validated request frame, borrowing the transport's buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request<'a> {
    pub command: Command,
    /// Bytes after the command byte. Reserved; no command reads them yet.
    pub payload: &'a [u8],
}

impl<'a> Request<'a> {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            payload: &[],
        }
    }

    /// Validate `data` as a request frame.
    ///
    /// Checks run in wire order: length, then preamble, then command byte.
    pub fn parse(data: &'a [u8]) -> Result<Self, FrameError> {
        if data.len() < MIN_REQUEST_LEN {
            return Err(FrameError::TooShort { len: data.len() });
        }
        if data[0] != REQUEST_PREAMBLE {
            return Err(FrameError::BadPreamble(data[0]));
        }
        let command = Command::try_from(data[1]).map_err(FrameError::UnknownCommand)?;
        Ok(Self {
            command,
            payload: &data[MIN_REQUEST_LEN..],
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(MIN_REQUEST_LEN + self.payload.len());
        buf.push(REQUEST_PREAMBLE);
        buf.push(self.command as u8);
        buf.extend_from_slice(self.payload);
        buf
    }
}

/// Wireless firmware version as reported by the radio coprocessor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FirmwareBuild {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    /// Status of the version query, 0 on success. Carried as data: a failed
    /// query still produces a response.
    pub status: u8,
}

impl FirmwareBuild {
    pub fn is_success(&self) -> bool {
        self.status == 0
    }
}

/// Result of a diagnostic command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "command", rename_all = "snake_case")
)]
pub enum Response {
    SignalStrength { rssi: i8 },
    FirmwareBuild(FirmwareBuild),
    IndicatorTest { ok: bool },
    /// Status of the first link only
    LinkStatus { status: u8 },
}

impl Response {
    pub fn command(&self) -> Command {
        match self {
            Response::SignalStrength { .. } => Command::GetSignalStrength,
            Response::FirmwareBuild(_) => Command::GetFirmwareBuild,
            Response::IndicatorTest { .. } => Command::IndicatorTest,
            Response::LinkStatus { .. } => Command::GetLinkStatus,
        }
    }

    /// Encode into a fresh frame
    pub fn encode(&self) -> ResponseFrame {
        let mut frame = ResponseFrame::new(self.command());
        match *self {
            Response::SignalStrength { rssi } => frame.push(rssi as u8),
            Response::FirmwareBuild(fw) => {
                frame.push(fw.major);
                frame.push(fw.minor);
                frame.push(fw.patch);
                frame.push(fw.status);
            }
            Response::IndicatorTest { ok } => frame.push(ok as u8),
            Response::LinkStatus { status } => frame.push(status),
        }
        debug_assert_eq!(frame.len(), self.command().response_len());
        frame
    }

    /// Decode a response frame received by the host
    pub fn from_bytes(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() < 2 {
            return Err(FrameError::TooShort { len: data.len() });
        }
        if data[0] != RESPONSE_PREAMBLE {
            return Err(FrameError::BadPreamble(data[0]));
        }
        let command = Command::try_from(data[1]).map_err(FrameError::UnknownCommand)?;
        let expected = command.response_len();
        if data.len() != expected {
            return Err(FrameError::LengthMismatch {
                command,
                expected,
                actual: data.len(),
            });
        }

        let result = &data[2..];
        Ok(match command {
            Command::GetSignalStrength => Response::SignalStrength {
                rssi: result[0] as i8,
            },
            Command::GetFirmwareBuild => Response::FirmwareBuild(FirmwareBuild {
                major: result[0],
                minor: result[1],
                patch: result[2],
                status: result[3],
            }),
            Command::IndicatorTest => Response::IndicatorTest {
                ok: result[0] != 0,
            },
            Command::GetLinkStatus => Response::LinkStatus { status: result[0] },
        })
    }
}

/// An encoded response, owned and sized for the largest command.
///
/// Built fresh for every dispatch, so its bytes never outlive the response
/// they belong to.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ResponseFrame {
    buf: [u8; MAX_RESPONSE_LEN],
    len: usize,
}

impl ResponseFrame {
    fn new(command: Command) -> Self {
        let mut buf = [0u8; MAX_RESPONSE_LEN];
        buf[0] = RESPONSE_PREAMBLE;
        buf[1] = command as u8;
        Self { buf, len: 2 }
    }

    fn push(&mut self, byte: u8) {
        self.buf[self.len] = byte;
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl AsRef<[u8]> for ResponseFrame {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl std::fmt::Debug for ResponseFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ResponseFrame({:02x?})", self.as_bytes())
    }
}
