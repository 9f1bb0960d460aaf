use crate::tag::DataType;

/// Errors that can occur while packing or unpacking payloads.
#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    /// The payload length does not match the schema for its data type.
    #[error("{data_type:?} payload must be {expected} bytes, got {actual}")]
    SizeMismatch {
        data_type: DataType,
        expected: usize,
        actual: usize,
    },

    /// No schema is registered for the wire data type.
    #[error("no schema registered for data type {0:#04x}")]
    UnknownType(u8),

    /// A payload was handed to the schema of a different data type.
    #[error("{actual:?} payload cannot be encoded as {expected:?}")]
    WrongSchema {
        expected: DataType,
        actual: DataType,
    },
}

impl PacketError {
    /// A malformed payload only loses that one packet.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SizeMismatch { .. } | Self::UnknownType(_))
    }
}

pub type Result<T> = std::result::Result<T, PacketError>;
