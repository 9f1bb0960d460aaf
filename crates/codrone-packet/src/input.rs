//! Controller input reports.

use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;

use crate::packet::Packet;
use crate::tag::DataType;

/// Button state. `button` is a bitmask of pressed buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Button {
    pub button: u16,
    pub event: u8,
}

impl Packet for Button {
    const DATA_TYPE: DataType = DataType::Button;
    const SIZE: usize = 3;

    fn pack(&self, dst: &mut BytesMut) {
        dst.put_u16_le(self.button);
        dst.put_u8(self.event);
    }

    fn read(src: &mut &[u8]) -> Self {
        Self {
            button: src.get_u16_le(),
            event: src.get_u8(),
        }
    }
}

/// One stick: position in -100..=100 plus direction and event codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct JoystickBlock {
    pub x: i8,
    pub y: i8,
    pub direction: u8,
    pub event: u8,
}

impl JoystickBlock {
    fn put(&self, dst: &mut BytesMut) {
        dst.put_i8(self.x);
        dst.put_i8(self.y);
        dst.put_u8(self.direction);
        dst.put_u8(self.event);
    }

    fn take(src: &mut &[u8]) -> Self {
        Self {
            x: src.get_i8(),
            y: src.get_i8(),
            direction: src.get_u8(),
            event: src.get_u8(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Joystick {
    pub left: JoystickBlock,
    pub right: JoystickBlock,
}

impl Packet for Joystick {
    const DATA_TYPE: DataType = DataType::Joystick;
    const SIZE: usize = 8;

    fn pack(&self, dst: &mut BytesMut) {
        self.left.put(dst);
        self.right.put(dst);
    }

    fn read(src: &mut &[u8]) -> Self {
        Self {
            left: JoystickBlock::take(src),
            right: JoystickBlock::take(src),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joystick_left_then_right() {
        let joystick = Joystick {
            left: JoystickBlock {
                x: -100,
                y: 100,
                direction: 0x11,
                event: 1,
            },
            right: JoystickBlock {
                x: 5,
                ..JoystickBlock::default()
            },
        };
        let bytes = joystick.to_bytes();
        assert_eq!(bytes.as_ref(), &[0x9C, 100, 0x11, 1, 5, 0, 0, 0]);
        assert_eq!(Joystick::unpack(&bytes).unwrap(), joystick);
    }

    #[test]
    fn button_mask_is_little_endian() {
        let button = Button {
            button: 0x0102,
            event: 3,
        };
        assert_eq!(button.to_bytes().as_ref(), &[0x02, 0x01, 3]);
    }
}
