/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The un-escaped frame is too short to hold a topic and a checksum.
    #[error("frame too short ({len} bytes, need at least 2)")]
    FrameTooShort { len: usize },

    /// The transmitted checksum does not match the one computed over the payload.
    #[error("crc8 mismatch (recv: {received:#04x}, calc: {computed:#04x})")]
    ChecksumMismatch { received: u8, computed: u8 },

    /// The COBS escaping of the frame body is invalid.
    #[error("malformed COBS encoding at offset {offset}")]
    MalformedCobs { offset: usize },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True for errors that reject a single frame but leave the stream usable.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            FrameError::FrameTooShort { .. }
                | FrameError::ChecksumMismatch { .. }
                | FrameError::MalformedCobs { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
