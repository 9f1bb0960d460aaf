use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;

use crate::packet::Packet;
use crate::tag::DataType;

/// Front and rear colour sensor readings plus the classified card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CardColor {
    /// Hue, saturation, value and lightness for each sensor.
    pub hsvl: [[i16; 4]; 2],
    pub color: [u8; 2],
    pub card: u8,
}

impl Packet for CardColor {
    const DATA_TYPE: DataType = DataType::CardColor;
    const SIZE: usize = 19;

    fn pack(&self, dst: &mut BytesMut) {
        for sensor in &self.hsvl {
            for value in sensor {
                dst.put_i16_le(*value);
            }
        }
        dst.put_slice(&self.color);
        dst.put_u8(self.card);
    }

    fn read(src: &mut &[u8]) -> Self {
        let mut hsvl = [[0i16; 4]; 2];
        for sensor in &mut hsvl {
            for value in sensor.iter_mut() {
                *value = src.get_i16_le();
            }
        }
        let mut color = [0u8; 2];
        src.copy_to_slice(&mut color);
        Self {
            hsvl,
            color,
            card: src.get_u8(),
        }
    }
}
