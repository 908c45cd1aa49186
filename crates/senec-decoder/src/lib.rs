mod catalog;

use thiserror::Error;
use tracing::trace;
use types::{DecodedValue, RawValue, TelemetrySnapshot};

pub use catalog::{find_spec, known_reading_ids, reading_specs, system_state_label, SYSTEM_STATES};

/// Width of the type tag at the start of every encoded value ("u8", "fl", ...).
const TAG_LEN: usize = 2;
/// Tag plus separator; the hex payload starts here.
const PREFIX_LEN: usize = 3;
const UNSIGNED_TAG: &str = "u8";
/// Hex digits of a big-endian f32.
const FLOAT_HEX_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("path {0} not found in snapshot")]
    PathNotFound(String),
    #[error("malformed encoding {value:?}: {reason}")]
    MalformedEncoding { value: String, reason: String },
    #[error("unknown state index {0}")]
    UnknownStateIndex(f64),
}

/// How a decoded number becomes the published value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    Raw,
    Magnitude,
    /// One direction of a bidirectional flow: positive values pass, the rest become `Zero`.
    PositiveOnly,
    /// The other direction: negative values pass as their magnitude, the rest become `Zero`.
    NegativeMagnitude,
    EnumeratedState,
    BatteryLevel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadingSpec {
    pub id: &'static str,
    /// Dotted `CATEGORY.FIELD` address into the snapshot.
    pub path: &'static str,
    pub display_name: &'static str,
    pub unit: Option<&'static str>,
    pub icon: &'static str,
    pub policy: SelectionPolicy,
}

impl ReadingSpec {
    pub fn entity_name(&self) -> String {
        format!("Senec {}", self.display_name)
    }
}

/// Result of decoding one reading.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub value: DecodedValue,
    /// Replaces the reading's static icon when set.
    pub icon: Option<String>,
}

impl Decoded {
    fn value(value: DecodedValue) -> Self {
        Self { value, icon: None }
    }
}

impl SelectionPolicy {
    pub fn apply(self, raw: RawValue) -> Result<Decoded, DecodeError> {
        let v = raw.as_f64();
        let decoded = match self {
            SelectionPolicy::EnumeratedState => {
                let index = state_index(raw).ok_or(DecodeError::UnknownStateIndex(v))?;
                let label = system_state_label(index).ok_or(DecodeError::UnknownStateIndex(v))?;
                Decoded::value(DecodedValue::Label(capitalize(label)))
            }
            SelectionPolicy::Magnitude => Decoded::value(DecodedValue::Number(round2(v.abs()))),
            SelectionPolicy::PositiveOnly => {
                if v > 0.0 {
                    Decoded::value(DecodedValue::Number(round2(v)))
                } else {
                    Decoded::value(DecodedValue::Zero)
                }
            }
            SelectionPolicy::NegativeMagnitude => {
                if v < 0.0 {
                    Decoded::value(DecodedValue::Number(round2(v.abs())))
                } else {
                    Decoded::value(DecodedValue::Zero)
                }
            }
            SelectionPolicy::BatteryLevel => {
                let level = v.abs().round() as i64;
                let bucket = level - level % 10;
                Decoded {
                    value: DecodedValue::Integer(level),
                    icon: Some(format!("mdi:battery-{bucket}")),
                }
            }
            SelectionPolicy::Raw => Decoded::value(DecodedValue::Number(round2(v))),
        };

        Ok(decoded)
    }
}

/// Decodes a single reading against a snapshot.
pub fn decode(snapshot: &TelemetrySnapshot, spec: &ReadingSpec) -> Result<Decoded, DecodeError> {
    let (category, field) = spec
        .path
        .split_once('.')
        .ok_or_else(|| DecodeError::PathNotFound(spec.path.to_string()))?;
    let leaf = snapshot
        .lookup(category, field)
        .ok_or_else(|| DecodeError::PathNotFound(spec.path.to_string()))?;
    let encoded = leaf
        .as_str()
        .ok_or_else(|| malformed(&leaf.to_string(), "leaf is not a string"))?;

    let raw = decode_raw(encoded)?;
    trace!(reading = spec.id, ?raw, "raw value decoded");
    spec.policy.apply(raw)
}

/// Type-tag dispatch for one encoded telemetry value.
///
/// `u8_<hex>` is an unsigned integer; any other tag carries a big-endian IEEE-754 f32 as eight
/// hex digits after the three character prefix.
pub fn decode_raw(encoded: &str) -> Result<RawValue, DecodeError> {
    let tag = encoded
        .get(..TAG_LEN)
        .ok_or_else(|| malformed(encoded, "missing type tag"))?;
    let payload = encoded
        .get(PREFIX_LEN..)
        .ok_or_else(|| malformed(encoded, "missing payload"))?;

    if tag == UNSIGNED_TAG {
        let digits = payload
            .strip_prefix("0x")
            .or_else(|| payload.strip_prefix("0X"))
            .unwrap_or(payload);
        if digits.is_empty() {
            return Err(malformed(encoded, "empty integer payload"));
        }
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(malformed(encoded, "non-hex character"));
        }
        return u64::from_str_radix(digits, 16)
            .map(RawValue::Unsigned)
            .map_err(|_| malformed(encoded, "integer overflow"));
    }

    if payload.len() % 2 != 0 {
        return Err(malformed(encoded, "odd-length hex payload"));
    }
    if !payload.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(malformed(encoded, "non-hex character"));
    }
    if payload.len() != FLOAT_HEX_LEN {
        return Err(malformed(
            encoded,
            &format!("expected 4 bytes, got {}", payload.len() / 2),
        ));
    }

    let bits = u32::from_str_radix(payload, 16).map_err(|_| malformed(encoded, "non-hex character"))?;
    let value = f32::from_bits(bits);
    if !value.is_finite() {
        return Err(malformed(encoded, "float is not finite"));
    }
    Ok(RawValue::Float(value))
}

fn state_index(raw: RawValue) -> Option<usize> {
    match raw {
        RawValue::Unsigned(v) => usize::try_from(v).ok(),
        RawValue::Float(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 => {
            usize::try_from(v as u64).ok()
        }
        RawValue::Float(_) => None,
    }
}

/// Nearest two-place decimal of the exact binary value, ties to even.
fn round2(value: f64) -> f64 {
    format!("{value:.2}").parse().unwrap_or(value)
}

/// First character upper case, the rest lower case.
fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

fn malformed(value: &str, reason: &str) -> DecodeError {
    DecodeError::MalformedEncoding {
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
