//! Signal definitions and raw↔semantic value conversion.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

/// Logical kind of a signal's semantic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Int,
    Float,
    /// Boolean materialized on the wire as one byte, 0x00 or 0x01.
    Flag,
}

/// A decoded semantic value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Flag(bool),
}

impl Value {
    /// Numeric view of the value (`Flag` maps to 0.0/1.0).
    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Int(v) => v as f64,
            Value::Float(v) => v,
            Value::Flag(v) => {
                if v {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Flag(v) => Some(v),
            _ => None,
        }
    }
}

/// Semantic payload of one message, keyed by signal key.
pub type Payload = HashMap<String, Value>;

/// Definition of one named field inside a message payload.
#[derive(Debug, Clone)]
pub struct SignalDef {
    /// Signal key used in semantic payloads.
    pub key: String,
    /// Wire name used in the generated DBC.
    pub dbc_name: String,
    pub start_bit: u8,
    /// Bit width, 1..=64.
    pub size: u8,
    pub signed: bool,
    pub scale: f64,
    pub offset: f64,
    /// Explicit physical minimum; derived from the width when absent.
    pub min: Option<f64>,
    /// Explicit physical maximum; derived from the width when absent.
    pub max: Option<f64>,
    pub unit: String,
    pub kind: SignalKind,
}

impl SignalDef {
    /// Check the definition invariants: width in [1, 64], non-zero scale,
    /// min ≤ max, and the signal fitting into an 8-byte frame.
    pub fn validate(&self) -> ProtocolResult<()> {
        if self.size == 0 || self.size > 64 {
            return Err(self.invalid(format!("bit width {} out of [1, 64]", self.size)));
        }
        if self.start_bit as u32 + self.size as u32 > 64 {
            return Err(self.invalid(format!(
                "bits [{}, {}) exceed the 8-byte frame",
                self.start_bit,
                self.start_bit as u32 + self.size as u32
            )));
        }
        if self.scale == 0.0 {
            return Err(self.invalid("scale must be non-zero".into()));
        }
        let (min, max) = self.value_range();
        if min > max {
            return Err(self.invalid(format!("min {min} > max {max}")));
        }
        Ok(())
    }

    /// Physical value range: the explicit min/max when present, otherwise
    /// derived from the bit width, sign, scale, and offset.
    pub fn value_range(&self) -> (f64, f64) {
        let (raw_min, raw_max) = if self.signed {
            let half = 1i128 << (self.size - 1);
            (-(half as f64), (half - 1) as f64)
        } else {
            let max = (1i128 << self.size) - 1;
            (0.0, max as f64)
        };
        let a = raw_min * self.scale + self.offset;
        let b = raw_max * self.scale + self.offset;
        (
            self.min.unwrap_or_else(|| a.min(b)),
            self.max.unwrap_or_else(|| a.max(b)),
        )
    }

    /// Convert raw wire bits into the semantic value.
    pub fn decode_raw(&self, raw: u64) -> ProtocolResult<Value> {
        match self.kind {
            SignalKind::Flag => match raw {
                0x00 => Ok(Value::Flag(false)),
                0x01 => Ok(Value::Flag(true)),
                value => Err(ProtocolError::InvalidFlag {
                    signal: self.key.clone(),
                    value,
                }),
            },
            SignalKind::Int => Ok(Value::Int((self.physical(raw)).round() as i64)),
            SignalKind::Float => Ok(Value::Float(self.physical(raw))),
        }
    }

    /// Convert a semantic value into raw wire bits (masked to the width).
    pub fn encode_value(&self, value: &Value) -> ProtocolResult<u64> {
        let raw = match (self.kind, value) {
            (SignalKind::Flag, Value::Flag(v)) => *v as i64,
            (SignalKind::Flag, _) => {
                return Err(ProtocolError::KindMismatch {
                    signal: self.key.clone(),
                    expected: "flag",
                });
            }
            (_, Value::Flag(_)) => {
                return Err(ProtocolError::KindMismatch {
                    signal: self.key.clone(),
                    expected: "numeric",
                });
            }
            (_, v) => ((v.as_f64() - self.offset) / self.scale).round() as i64,
        };
        Ok((raw as u64) & self.mask())
    }

    fn mask(&self) -> u64 {
        if self.size >= 64 {
            u64::MAX
        } else {
            (1u64 << self.size) - 1
        }
    }

    fn physical(&self, raw: u64) -> f64 {
        let raw = raw & self.mask();
        let signed_raw = if self.signed && self.size < 64 && raw & (1u64 << (self.size - 1)) != 0 {
            raw as i128 - (1i128 << self.size)
        } else {
            raw as i128
        };
        signed_raw as f64 * self.scale + self.offset
    }

    fn invalid(&self, reason: String) -> ProtocolError {
        ProtocolError::InvalidSignal {
            signal: self.key.clone(),
            reason,
        }
    }
}
