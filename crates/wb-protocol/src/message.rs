//! Message definitions and the 8-byte payload codec.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};
use crate::signal::{Payload, SignalDef};

/// Message direction from the master's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Rx,
    Tx,
}

/// A message type: PGN, priority, direction, and its ordered signals.
#[derive(Debug, Clone)]
pub struct MessageDef {
    pub key: String,
    pub dbc_name: String,
    pub pgn: u32,
    /// J1939 priority, 0..=7.
    pub priority: u8,
    pub direction: Direction,
    pub signals: Vec<SignalDef>,
}

impl MessageDef {
    pub fn validate(&self) -> ProtocolResult<()> {
        if self.priority > 7 {
            return Err(ProtocolError::InvalidSignal {
                signal: self.key.clone(),
                reason: format!("priority {} out of [0, 7]", self.priority),
            });
        }
        for signal in &self.signals {
            signal.validate()?;
        }
        Ok(())
    }

    pub fn signal(&self, key: &str) -> Option<&SignalDef> {
        self.signals.iter().find(|s| s.key == key)
    }

    /// Encode a semantic payload into 8 data bytes.
    ///
    /// Every declared signal must be present in the payload; encoding against
    /// a partial payload is a programmer error.
    pub fn encode(&self, payload: &Payload) -> ProtocolResult<[u8; 8]> {
        let mut word = 0u64;
        for signal in &self.signals {
            let value = payload
                .get(&signal.key)
                .ok_or_else(|| ProtocolError::MissingSignal(signal.key.clone()))?;
            let raw = signal.encode_value(value)?;
            word |= raw << signal.start_bit;
        }
        Ok(word.to_le_bytes())
    }

    /// Decode 8 data bytes into the semantic payload.
    pub fn decode(&self, data: &[u8]) -> ProtocolResult<Payload> {
        if data.len() < 8 {
            return Err(ProtocolError::ShortFrame(data.len()));
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&data[..8]);
        let word = u64::from_le_bytes(bytes);

        let mut payload = Payload::with_capacity(self.signals.len());
        for signal in &self.signals {
            let mask = if signal.size >= 64 {
                u64::MAX
            } else {
                (1u64 << signal.size) - 1
            };
            let raw = (word >> signal.start_bit) & mask;
            payload.insert(signal.key.clone(), signal.decode_raw(raw)?);
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{SignalKind, Value};

    fn therm_state() -> MessageDef {
        MessageDef {
            key: "therm_state".into(),
            dbc_name: "TEMP_STATE".into(),
            pgn: 0xFF10,
            priority: 6,
            direction: Direction::Rx,
            signals: vec![
                SignalDef {
                    key: "temp_c".into(),
                    dbc_name: "TEMP_C".into(),
                    start_bit: 0,
                    size: 16,
                    signed: true,
                    scale: 0.01,
                    offset: 0.0,
                    min: None,
                    max: None,
                    unit: "degC".into(),
                    kind: SignalKind::Float,
                },
                SignalDef {
                    key: "temp_v".into(),
                    dbc_name: "TEMP_V".into(),
                    start_bit: 16,
                    size: 16,
                    signed: false,
                    scale: 0.001,
                    offset: 0.0,
                    min: None,
                    max: None,
                    unit: "V".into(),
                    kind: SignalKind::Float,
                },
            ],
        }
    }

    fn relay_cmd() -> MessageDef {
        MessageDef {
            key: "relay_cmd".into(),
            dbc_name: "RELAY_CMD".into(),
            pgn: 0x1000,
            priority: 6,
            direction: Direction::Tx,
            signals: vec![SignalDef {
                key: "on".into(),
                dbc_name: "RELAY_STATE".into(),
                start_bit: 0,
                size: 8,
                signed: false,
                scale: 1.0,
                offset: 0.0,
                min: None,
                max: None,
                unit: String::new(),
                kind: SignalKind::Flag,
            }],
        }
    }

    #[test]
    fn payload_round_trip() {
        let msg = therm_state();
        let payload = Payload::from([
            ("temp_c".to_string(), Value::Float(64.25)),
            ("temp_v".to_string(), Value::Float(2.305)),
        ]);

        let data = msg.encode(&payload).unwrap();
        let decoded = msg.decode(&data).unwrap();
        // Round-trips up to the signal scale rounding.
        assert!((decoded["temp_c"].as_f64() - 64.25).abs() < 1e-9);
        assert!((decoded["temp_v"].as_f64() - 2.305).abs() < 1e-9);
    }

    #[test]
    fn flag_on_wire_is_single_byte() {
        let msg = relay_cmd();
        let on = Payload::from([("on".to_string(), Value::Flag(true))]);
        let data = msg.encode(&on).unwrap();
        assert_eq!(data, [0x01, 0, 0, 0, 0, 0, 0, 0]);

        let off = Payload::from([("on".to_string(), Value::Flag(false))]);
        assert_eq!(msg.encode(&off).unwrap(), [0u8; 8]);
    }

    #[test]
    fn decode_rejects_bad_flag_byte() {
        let msg = relay_cmd();
        let data = [0x7Fu8, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            msg.decode(&data),
            Err(ProtocolError::InvalidFlag { .. })
        ));
    }

    #[test]
    fn encode_requires_all_signals() {
        let msg = therm_state();
        let partial = Payload::from([("temp_c".to_string(), Value::Float(20.0))]);
        assert!(matches!(
            msg.encode(&partial),
            Err(ProtocolError::MissingSignal(_))
        ));
    }

    #[test]
    fn decode_rejects_short_data() {
        let msg = relay_cmd();
        assert!(matches!(
            msg.decode(&[0x01, 0x00]),
            Err(ProtocolError::ShortFrame(2))
        ));
    }
}
