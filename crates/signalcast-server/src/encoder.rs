//! Rendering of outbound messages into WebSocket text frames.

use signalcast_types::{ServerMessage, SimulatorState};

/// Largest frame the encoder will produce.
///
/// Every message in the schema is a few dozen bytes; anything larger means
/// the schema changed without this bound being revisited.
pub const MAX_FRAME_LEN: usize = 256;

/// Errors that can occur while encoding.
///
/// The schema is fixed and contains no client input, so these indicate a
/// programming error rather than a runtime condition.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The serializer rejected the message.
    #[error("failed to serialize message: {source}")]
    Serialize {
        /// The underlying serializer error.
        #[from]
        source: serde_json::Error,
    },

    /// The rendered frame exceeds the configured bound.
    #[error("frame of {len} bytes exceeds limit of {limit}")]
    FrameTooLarge {
        /// Rendered length.
        len: usize,
        /// Configured limit.
        limit: usize,
    },
}

/// Deterministic JSON renderer for [`ServerMessage`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastEncoder {
    max_frame_len: usize,
}

impl Default for BroadcastEncoder {
    fn default() -> Self {
        Self {
            max_frame_len: MAX_FRAME_LEN,
        }
    }
}

impl BroadcastEncoder {
    /// Create an encoder with the default frame bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Render the traffic update for a simulator snapshot.
    pub fn encode(&self, state: &SimulatorState) -> Result<String, EncodeError> {
        self.encode_message(&ServerMessage::traffic_update(state))
    }

    /// Render any server message.
    pub fn encode_message(&self, message: &ServerMessage) -> Result<String, EncodeError> {
        let frame = serde_json::to_string(message)?;
        if frame.len() > self.max_frame_len {
            return Err(EncodeError::FrameTooLarge {
                len: frame.len(),
                limit: self.max_frame_len,
            });
        }
        Ok(frame)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use serde_json::Value;
    use signalcast_types::{AxisTimer, SignalState};

    use super::*;

    fn state(ns: (SignalState, u32), ew: (SignalState, u32)) -> SimulatorState {
        SimulatorState {
            ns: AxisTimer::new(ns.0, ns.1),
            ew: AxisTimer::new(ew.0, ew.1),
        }
    }

    #[test]
    fn renders_exact_wire_text() {
        let encoder = BroadcastEncoder::new();
        let frame = encoder
            .encode(&state((SignalState::Yellow, 3), (SignalState::Red, 3)))
            .unwrap();
        assert_eq!(
            frame,
            r#"{"type":"traffic_update","ns":{"color":"yellow","timer":3},"ew":{"color":"red","timer":3}}"#
        );
    }

    #[test]
    fn update_parses_with_expected_fields_only() {
        let encoder = BroadcastEncoder::new();
        let frame = encoder
            .encode(&state((SignalState::Green, 27), (SignalState::Red, 30)))
            .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();

        let top = value.as_object().unwrap();
        let mut keys: Vec<&str> = top.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["ew", "ns", "type"]);
        assert_eq!(value["type"], "traffic_update");

        for axis in ["ns", "ew"] {
            let fields = value[axis].as_object().unwrap();
            assert_eq!(fields.len(), 2, "{axis} has extra fields");
            let color = fields["color"].as_str().unwrap();
            assert!(["red", "green", "yellow"].contains(&color));
            assert!(fields["timer"].is_u64());
        }
    }

    #[test]
    fn encoding_is_deterministic() {
        let encoder = BroadcastEncoder::new();
        let snapshot = state((SignalState::Red, 12), (SignalState::Green, 9));
        assert_eq!(encoder.encode(&snapshot).unwrap(), encoder.encode(&snapshot).unwrap());
    }

    #[test]
    fn largest_update_fits_frame_bound() {
        let encoder = BroadcastEncoder::new();
        let frame = encoder.encode(&state(
            (SignalState::Yellow, u32::MAX),
            (SignalState::Yellow, u32::MAX),
        ));
        assert!(frame.is_ok());
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let encoder = BroadcastEncoder { max_frame_len: 8 };
        let result = encoder.encode_message(&ServerMessage::pong());
        assert!(matches!(result, Err(EncodeError::FrameTooLarge { limit: 8, .. })));
    }
}
