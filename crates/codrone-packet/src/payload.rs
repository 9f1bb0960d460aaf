//! The tagged union of every known payload.

use bytes::{Bytes, BytesMut};
use serde::Serialize;

use crate::card::CardColor;
use crate::control::{Command, Control, ControlPosition, ControlPosition16, ControlRequest};
use crate::error::Result;
use crate::input::{Button, Joystick};
use crate::link::{Ack, Address, ErrorFlags, Information, Ping, Request};
use crate::packet::{Packet, PayloadKind};
use crate::status::{Altitude, Attitude, Count, Flow, Motion, Position, Range, State, Trim};
use crate::tag::DataType;

macro_rules! payloads {
    ($($variant:ident => $ty:ty),+ $(,)?) => {
        /// One decoded payload, tagged by its [`DataType`].
        #[derive(Debug, Clone, Copy, PartialEq, Serialize)]
        #[serde(tag = "type", content = "data", rename_all = "kebab-case")]
        pub enum Payload {
            $($variant($ty),)+
        }

        impl Payload {
            /// Decode `src` with the schema registered for `data_type`.
            pub fn decode(data_type: DataType, src: &[u8]) -> Result<Self> {
                match data_type {
                    $(DataType::$variant => <$ty>::unpack(src).map(Self::$variant),)+
                }
            }

            pub fn data_type(&self) -> DataType {
                match self {
                    $(Self::$variant(_) => DataType::$variant,)+
                }
            }

            pub fn encode(&self, dst: &mut BytesMut) {
                match self {
                    $(Self::$variant(packet) => packet.pack(dst),)+
                }
            }
        }

        impl DataType {
            /// Fixed payload length for this data type.
            pub const fn payload_size(self) -> usize {
                match self {
                    $(Self::$variant => <$ty as Packet>::SIZE,)+
                }
            }
        }

        $(
            impl PayloadKind for $ty {
                fn from_payload(payload: &Payload) -> Option<&Self> {
                    match payload {
                        Payload::$variant(packet) => Some(packet),
                        _ => None,
                    }
                }

                fn into_payload(self) -> Payload {
                    Payload::$variant(self)
                }
            }
        )+
    };
}

payloads! {
    Ping => Ping,
    Ack => Ack,
    Error => ErrorFlags,
    Request => Request,
    Address => Address,
    Information => Information,
    Control => Control,
    ControlRequest => ControlRequest,
    ControlPosition16 => ControlPosition16,
    ControlPosition => ControlPosition,
    Command => Command,
    State => State,
    Attitude => Attitude,
    Position => Position,
    Altitude => Altitude,
    Motion => Motion,
    Range => Range,
    Flow => Flow,
    Count => Count,
    Trim => Trim,
    Button => Button,
    Joystick => Joystick,
    CardColor => CardColor,
}

impl Payload {
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.data_type().payload_size());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Borrow the inner packet if it is a `T`.
    pub fn get<T: PayloadKind>(&self) -> Option<&T> {
        T::from_payload(self)
    }
}
