use bytes::{Bytes, BytesMut};

use crate::error::{PacketError, Result};
use crate::payload::Payload;
use crate::tag::DataType;

/// A fixed-width little-endian payload struct.
///
/// `pack` writes exactly [`Packet::SIZE`] bytes and `unpack` accepts exactly
/// that many, so `unpack(pack(x)) == x` for every value.
pub trait Packet: Sized {
    const DATA_TYPE: DataType;
    const SIZE: usize;

    fn pack(&self, dst: &mut BytesMut);

    /// Decode from a slice whose length has already been checked.
    fn read(src: &mut &[u8]) -> Self;

    fn unpack(src: &[u8]) -> Result<Self> {
        if src.len() != Self::SIZE {
            return Err(PacketError::SizeMismatch {
                data_type: Self::DATA_TYPE,
                expected: Self::SIZE,
                actual: src.len(),
            });
        }
        let mut cursor = src;
        Ok(Self::read(&mut cursor))
    }

    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        self.pack(&mut buf);
        buf.freeze()
    }
}

/// Links a payload struct to its [`Payload`] variant.
pub trait PayloadKind: Packet {
    fn from_payload(payload: &Payload) -> Option<&Self>;
    fn into_payload(self) -> Payload;
}
