use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};
use codrone_frame::{Frame, Route};
use tracing::debug;

use crate::error::{PacketError, Result};
use crate::payload::Payload;
use crate::tag::DataType;

/// Fixed-size schema for one data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub data_type: DataType,
    pub size: usize,
}

impl Schema {
    pub fn name(&self) -> &'static str {
        self.data_type.name()
    }

    pub fn decode(&self, src: &[u8]) -> Result<Payload> {
        Payload::decode(self.data_type, src)
    }

    pub fn encode(&self, payload: &Payload) -> Result<Bytes> {
        if payload.data_type() != self.data_type {
            return Err(PacketError::WrongSchema {
                expected: self.data_type,
                actual: payload.data_type(),
            });
        }
        let mut buf = BytesMut::with_capacity(self.size);
        payload.encode(&mut buf);
        Ok(buf.freeze())
    }
}

/// Look up the schema for a data type. Every data type has exactly one.
pub fn schema_for(data_type: DataType) -> Schema {
    Schema {
        data_type,
        size: data_type.payload_size(),
    }
}

/// Registry behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryConfig {
    /// Report unknown data types as errors instead of [`Decoded::Unknown`].
    pub fail_on_unknown_type: bool,
}

/// Outcome of decoding one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decoded {
    Packet(Payload),
    /// No schema is registered for this wire byte; the frame is skipped.
    Unknown(u8),
}

/// Data-type keyed table of payload schemas.
pub struct PacketRegistry {
    schemas: BTreeMap<DataType, Schema>,
    config: RegistryConfig,
}

impl PacketRegistry {
    /// Create a registry with every known schema.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        let schemas = DataType::ALL
            .iter()
            .map(|data_type| (*data_type, schema_for(*data_type)))
            .collect();
        Self { schemas, config }
    }

    /// Stop decoding a data type. Its frames are then treated as unknown.
    pub fn unregister(&mut self, data_type: DataType) -> Option<Schema> {
        self.schemas.remove(&data_type)
    }

    pub fn register(&mut self, data_type: DataType) {
        self.schemas.insert(data_type, schema_for(data_type));
    }

    /// Decode a checked frame into its typed payload.
    ///
    /// Returns [`Decoded::Unknown`] for wire bytes without a registered
    /// schema unless [`RegistryConfig::fail_on_unknown_type`] is set. A
    /// payload of the wrong length is always an error.
    pub fn decode(&self, frame: &Frame) -> Result<Decoded> {
        let resolved = DataType::resolve(frame.data_type, frame.payload.len())
            .and_then(|data_type| self.schemas.get(&data_type));

        match resolved {
            Some(schema) => schema.decode(&frame.payload).map(Decoded::Packet),
            None if self.config.fail_on_unknown_type => {
                Err(PacketError::UnknownType(frame.data_type))
            }
            None => {
                debug!(
                    data_type = frame.data_type,
                    len = frame.payload.len(),
                    "no schema registered, skipping frame"
                );
                Ok(Decoded::Unknown(frame.data_type))
            }
        }
    }

    /// Build a frame carrying `payload` along `route`.
    pub fn encode(&self, payload: &Payload, route: Route) -> Result<Frame> {
        let data_type = payload.data_type();
        let schema = self
            .schemas
            .get(&data_type)
            .ok_or(PacketError::UnknownType(data_type.wire_byte()))?;
        Ok(Frame::new(data_type.wire_byte(), schema.encode(payload)?).with_route(route))
    }

    pub fn has_schema(&self, data_type: DataType) -> bool {
        self.schemas.contains_key(&data_type)
    }

    /// Registered data types in declaration order.
    pub fn data_types(&self) -> Vec<DataType> {
        self.schemas.keys().copied().collect()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

impl Default for PacketRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use codrone_frame::DeviceType;

    use super::*;
    use crate::control::{Control, ControlPosition, ControlPosition16, ControlRequest};
    use crate::packet::{Packet, PayloadKind};
    use crate::status::State;

    fn frame_of<T: Packet>(packet: &T) -> Frame {
        Frame::new(T::DATA_TYPE.wire_byte(), packet.to_bytes())
    }

    #[test]
    fn decodes_state_frame() {
        let registry = PacketRegistry::new();
        let state = State {
            mode_flight: 0x10,
            battery: 85,
            ..State::default()
        };

        let decoded = registry.decode(&frame_of(&state)).unwrap();
        assert_eq!(decoded, Decoded::Packet(state.into_payload()));
    }

    #[test]
    fn representative_schemas_roundtrip_extremes() {
        let registry = PacketRegistry::new();
        let payloads = [
            ControlRequest::new(Control::default(), DataType::State).into_payload(),
            ControlRequest {
                control: Control {
                    roll: i8::MIN,
                    pitch: i8::MAX,
                    yaw: i8::MIN,
                    throttle: i8::MAX,
                },
                request: u8::MAX,
            }
            .into_payload(),
            ControlPosition::default().into_payload(),
            ControlPosition {
                x: f32::MIN,
                y: f32::MAX,
                z: -1.5,
                velocity: f32::MAX,
                heading: i16::MIN,
                rotational_velocity: i16::MAX,
            }
            .into_payload(),
            ControlPosition16::default().into_payload(),
            ControlPosition16 {
                x: i16::MIN,
                y: i16::MAX,
                z: i16::MIN,
                velocity: i16::MAX,
                heading: i16::MIN,
                rotational_velocity: i16::MAX,
            }
            .into_payload(),
        ];

        for payload in payloads {
            let frame = registry.encode(&payload, Route::BASE_TO_DRONE).unwrap();
            assert_eq!(frame.payload.len(), payload.data_type().payload_size());
            assert_eq!(registry.decode(&frame).unwrap(), Decoded::Packet(payload));
        }
    }

    #[test]
    fn control_variants_share_wire_byte() {
        let registry = PacketRegistry::new();
        let frame = registry
            .encode(
                &ControlPosition16::default().into_payload(),
                Route::BASE_TO_DRONE,
            )
            .unwrap();
        assert_eq!(frame.data_type, 0x10);

        match registry.decode(&frame).unwrap() {
            Decoded::Packet(payload) => {
                assert_eq!(payload.data_type(), DataType::ControlPosition16)
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_wire_byte_is_skipped() {
        let registry = PacketRegistry::new();
        let frame = Frame::new(0x62, vec![1, 2, 3]);
        assert_eq!(registry.decode(&frame).unwrap(), Decoded::Unknown(0x62));
    }

    #[test]
    fn unknown_wire_byte_fails_when_configured() {
        let registry = PacketRegistry::with_config(RegistryConfig {
            fail_on_unknown_type: true,
        });
        let err = registry.decode(&Frame::new(0x62, Vec::new())).unwrap_err();
        assert!(matches!(err, PacketError::UnknownType(0x62)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn unregistered_type_is_unknown() {
        let mut registry = PacketRegistry::new();
        assert!(registry.unregister(DataType::State).is_some());
        assert!(!registry.has_schema(DataType::State));

        let decoded = registry.decode(&frame_of(&State::default())).unwrap();
        assert_eq!(decoded, Decoded::Unknown(0x40));

        registry.register(DataType::State);
        assert!(registry.has_schema(DataType::State));
    }

    #[test]
    fn wrong_length_is_error() {
        let registry = PacketRegistry::new();
        let err = registry.decode(&Frame::new(0x40, vec![0u8; 7])).unwrap_err();
        assert!(matches!(
            err,
            PacketError::SizeMismatch {
                data_type: DataType::State,
                expected: 8,
                actual: 7
            }
        ));
    }

    #[test]
    fn encode_keeps_route() {
        let registry = PacketRegistry::new();
        let route = Route::new(DeviceType::Drone, DeviceType::Base);
        let frame = registry
            .encode(&State::default().into_payload(), route)
            .unwrap();
        assert_eq!(frame.route, route);
    }

    #[test]
    fn schema_rejects_foreign_payload() {
        let err = schema_for(DataType::Motion)
            .encode(&State::default().into_payload())
            .unwrap_err();
        assert!(matches!(
            err,
            PacketError::WrongSchema {
                expected: DataType::Motion,
                actual: DataType::State
            }
        ));
    }

    #[test]
    fn lists_every_type_by_default() {
        let registry = PacketRegistry::default();
        assert_eq!(registry.data_types(), DataType::ALL.to_vec());
        assert_eq!(registry.config(), &RegistryConfig::default());
        assert_eq!(schema_for(DataType::CardColor).size, 19);
        assert_eq!(schema_for(DataType::CardColor).name(), "card-color");
    }
}
