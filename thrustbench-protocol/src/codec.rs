//! Message encoding and decoding
//!
//! The control core sees the wire format only through [`MessageCodec`].
//! [`JsonCodec`] implements the collector's JSON format on top of
//! `serde_json` (with `alloc`).

use alloc::string::String;
use serde::Deserialize;

use crate::messages::{
    Command, CommandName, OutboundMessage, CMD_CALIBRATE, CMD_START_TEST, CMD_STOP_TEST,
    CMD_TARE, MAX_COMMAND_NAME_LEN,
};

/// Errors that can occur while decoding an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Payload is not a well-formed message object
    Malformed,
    /// A field required by the command is absent
    MissingField(&'static str),
    /// A field has an unusable value
    InvalidField(&'static str),
    /// Well-formed message naming a command this firmware does not know
    UnknownCommand { name: CommandName },
}

impl DecodeError {
    /// Short reason used in acknowledgments
    pub fn reason(&self) -> &'static str {
        match self {
            DecodeError::Malformed => "malformed",
            DecodeError::MissingField(_) => "missing_field",
            DecodeError::InvalidField(_) => "invalid_field",
            DecodeError::UnknownCommand { .. } => "unknown_command",
        }
    }
}

/// Errors that can occur while encoding an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    /// Serializer rejected the message
    Serialize,
    /// Output buffer too small for the encoded message
    BufferTooSmall,
}

/// Structured message codec
pub trait MessageCodec {
    /// Decode one inbound payload into a command
    fn decode(&self, payload: &[u8]) -> Result<Command, DecodeError>;

    /// Encode an outbound message into `buffer`
    ///
    /// Returns the number of bytes written.
    fn encode(&self, message: &OutboundMessage<'_>, buffer: &mut [u8])
        -> Result<usize, EncodeError>;
}

/// Inbound object shape before the command name is resolved
#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    known_mass: Option<f64>,
}

/// JSON wire codec used by the collector
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new codec
    pub const fn new() -> Self {
        Self
    }
}

impl MessageCodec for JsonCodec {
    fn decode(&self, payload: &[u8]) -> Result<Command, DecodeError> {
        let envelope: Envelope =
            serde_json::from_slice(payload).map_err(|_| DecodeError::Malformed)?;

        match envelope.kind.as_str() {
            CMD_TARE => Ok(Command::Tare),
            CMD_START_TEST => Ok(Command::StartTest),
            CMD_STOP_TEST => Ok(Command::StopTest),
            CMD_CALIBRATE => {
                let known_mass = envelope
                    .known_mass
                    .ok_or(DecodeError::MissingField("known_mass"))?;
                if !known_mass.is_finite() {
                    return Err(DecodeError::InvalidField("known_mass"));
                }
                // Range checks (known_mass > 0) belong to the calibration engine
                Ok(Command::Calibrate { known_mass })
            }
            other => Err(DecodeError::UnknownCommand {
                name: truncate_name(other),
            }),
        }
    }

    fn encode(
        &self,
        message: &OutboundMessage<'_>,
        buffer: &mut [u8],
    ) -> Result<usize, EncodeError> {
        let bytes = serde_json::to_vec(message).map_err(|_| EncodeError::Serialize)?;
        if bytes.len() > buffer.len() {
            return Err(EncodeError::BufferTooSmall);
        }
        buffer[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }
}

/// Copy a command name, cutting it at a char boundary if too long
fn truncate_name(name: &str) -> CommandName {
    let mut out = CommandName::new();
    for ch in name.chars() {
        if out.len() + ch.len_utf8() > MAX_COMMAND_NAME_LEN {
            break;
        }
        // Capacity checked above
        let _ = out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Ack, ReadingMessage, StatusMessage, MAX_MESSAGE_SIZE};

    fn encode_str<'b>(msg: &OutboundMessage<'_>, buf: &'b mut [u8]) -> &'b str {
        let len = JsonCodec.encode(msg, buf).unwrap();
        core::str::from_utf8(&buf[..len]).unwrap()
    }

    #[test]
    fn test_decode_simple_commands() {
        let codec = JsonCodec::new();
        assert_eq!(codec.decode(br#"{"type":"tare"}"#), Ok(Command::Tare));
        assert_eq!(
            codec.decode(br#"{"type":"start_test"}"#),
            Ok(Command::StartTest)
        );
        assert_eq!(
            codec.decode(br#"{"type":"stop_test"}"#),
            Ok(Command::StopTest)
        );
    }

    #[test]
    fn test_decode_calibrate_integer_mass() {
        let cmd = JsonCodec
            .decode(br#"{"type":"calibrate","known_mass":100}"#)
            .unwrap();
        assert_eq!(cmd, Command::Calibrate { known_mass: 100.0 });
    }

    #[test]
    fn test_decode_ignores_extra_fields() {
        let cmd = JsonCodec
            .decode(br#"{"known_mass":2.5,"source":"dashboard","type":"calibrate"}"#)
            .unwrap();
        assert_eq!(cmd, Command::Calibrate { known_mass: 2.5 });
    }

    #[test]
    fn test_decode_calibrate_missing_mass() {
        assert_eq!(
            JsonCodec.decode(br#"{"type":"calibrate"}"#),
            Err(DecodeError::MissingField("known_mass"))
        );
        assert_eq!(
            JsonCodec.decode(br#"{"type":"calibrate","known_mass":null}"#),
            Err(DecodeError::MissingField("known_mass"))
        );
    }

    #[test]
    fn test_decode_unknown_command() {
        let err = JsonCodec.decode(br#"{"type":"reboot"}"#).unwrap_err();
        match err {
            DecodeError::UnknownCommand { name } => assert_eq!(name.as_str(), "reboot"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_command_long_name_truncated() {
        let err = JsonCodec
            .decode(br#"{"type":"a_really_long_command_name_from_the_future"}"#)
            .unwrap_err();
        match err {
            DecodeError::UnknownCommand { name } => {
                assert_eq!(name.len(), MAX_COMMAND_NAME_LEN);
                assert!(name.starts_with("a_really_long"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_decode_malformed() {
        assert_eq!(JsonCodec.decode(b"not json"), Err(DecodeError::Malformed));
        assert_eq!(JsonCodec.decode(br#"{"kind":"tare"}"#), Err(DecodeError::Malformed));
        assert_eq!(JsonCodec.decode(br#"{"type":7}"#), Err(DecodeError::Malformed));
        assert_eq!(JsonCodec.decode(b""), Err(DecodeError::Malformed));
    }

    #[test]
    fn test_encode_reading_rounds_force() {
        let mut buf = [0u8; MAX_MESSAGE_SIZE];
        let msg = OutboundMessage::Reading(ReadingMessage {
            timestamp: 1200,
            force: 12.3456,
            raw: 51000,
        });
        assert_eq!(
            encode_str(&msg, &mut buf),
            r#"{"type":"reading","timestamp":1200,"force":12.35,"raw":51000}"#
        );
    }

    #[test]
    fn test_encode_ack() {
        let mut buf = [0u8; MAX_MESSAGE_SIZE];
        let ok = OutboundMessage::Ack(Ack::ok("tare"));
        assert_eq!(
            encode_str(&ok, &mut buf),
            r#"{"type":"ack","command":"tare","ok":true}"#
        );

        let failed = OutboundMessage::Ack(Ack::failed("calibrate", "invalid_input"));
        assert_eq!(
            encode_str(&failed, &mut buf),
            r#"{"type":"ack","command":"calibrate","ok":false,"error":"invalid_input"}"#
        );
    }

    #[test]
    fn test_encode_status() {
        let mut buf = [0u8; MAX_MESSAGE_SIZE];
        let msg = OutboundMessage::Status(StatusMessage {
            state: "idle",
            scale: 500.0,
            offset: 1000,
        });
        assert_eq!(
            encode_str(&msg, &mut buf),
            r#"{"type":"status","state":"idle","scale":500.0,"offset":1000}"#
        );
    }

    #[test]
    fn test_encode_buffer_too_small() {
        let mut buf = [0u8; 8];
        let msg = OutboundMessage::Ack(Ack::ok("tare"));
        assert_eq!(
            JsonCodec.encode(&msg, &mut buf),
            Err(EncodeError::BufferTooSmall)
        );
    }

    #[test]
    fn test_decode_error_reasons() {
        assert_eq!(DecodeError::Malformed.reason(), "malformed");
        assert_eq!(DecodeError::MissingField("x").reason(), "missing_field");
        assert_eq!(
            DecodeError::UnknownCommand {
                name: CommandName::new()
            }
            .reason(),
            "unknown_command"
        );
    }

    proptest::proptest! {
        #[test]
        fn prop_calibrate_mass_survives_decode(mass in 0.001f64..100_000.0) {
            let payload = alloc::format!(r#"{{"type":"calibrate","known_mass":{}}}"#, mass);
            match JsonCodec.decode(payload.as_bytes()) {
                Ok(Command::Calibrate { known_mass }) => {
                    proptest::prop_assert!((known_mass - mass).abs() <= mass * 1e-12);
                }
                other => proptest::prop_assert!(false, "unexpected decode: {:?}", other),
            }
        }
    }
}
