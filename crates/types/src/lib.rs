use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Value produced by the type-tag dispatch before any selection policy runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    Unsigned(u64),
    Float(f32),
}

impl RawValue {
    pub fn as_f64(self) -> f64 {
        match self {
            RawValue::Unsigned(v) => v as f64,
            RawValue::Float(v) => f64::from(v),
        }
    }
}

/// Final per-reading value.
///
/// `Zero` is the bare integer emitted by the sign-splitting policies when the flow points the
/// other way. It renders as `0`, while `Number(0.0)` renders as `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DecodedValue {
    Number(f64),
    Zero,
    Integer(i64),
    Label(String),
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedValue::Number(v) => write_number(f, *v),
            DecodedValue::Zero => f.write_str("0"),
            DecodedValue::Integer(v) => write!(f, "{v}"),
            DecodedValue::Label(label) => f.write_str(label),
        }
    }
}

/// Shortest round-trip digits; scientific notation outside `[1e-4, 1e16)` with a signed exponent of
/// at least two digits, and a trailing `.0` on integral values.
fn write_number(f: &mut fmt::Formatter<'_>, v: f64) -> fmt::Result {
    if v.is_nan() {
        return f.write_str("nan");
    }
    if v.is_infinite() {
        return f.write_str(if v < 0.0 { "-inf" } else { "inf" });
    }

    let magnitude = v.abs();
    if magnitude == 0.0 || (1e-4..1e16).contains(&magnitude) {
        return if v.fract() == 0.0 {
            write!(f, "{v:.1}")
        } else {
            write!(f, "{v}")
        };
    }

    let scientific = format!("{v:e}");
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let exponent: i32 = exponent.parse().unwrap_or_default();
    let sign = if exponent < 0 { '-' } else { '+' };
    write!(f, "{mantissa}e{sign}{:02}", exponent.unsigned_abs())
}

/// The inverter being polled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub host: String,
}

/// One fetched copy of the device telemetry tree: category -> field -> encoded value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    categories: Map<String, Value>,
    collected_at_ms: u64,
}

impl TelemetrySnapshot {
    pub fn new(categories: Map<String, Value>, collected_at_ms: u64) -> Self {
        Self {
            categories,
            collected_at_ms,
        }
    }

    /// Returns `None` unless the top level is a JSON object.
    pub fn from_value(value: Value, collected_at_ms: u64) -> Option<Self> {
        match value {
            Value::Object(categories) => Some(Self::new(categories, collected_at_ms)),
            _ => None,
        }
    }

    pub fn lookup(&self, category: &str, field: &str) -> Option<&Value> {
        self.categories.get(category)?.as_object()?.get(field)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn collected_at_ms(&self) -> u64 {
        self.collected_at_ms
    }
}

/// A reading as handed to the host: one per configured identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedReading {
    pub id: String,
    pub name: String,
    /// `None` until the reading has decoded successfully or been restored.
    pub value: Option<DecodedValue>,
    pub unit: Option<String>,
    pub icon: String,
    pub updated_at_ms: u64,
}

impl PublishedReading {
    /// Rendered state string, `None` when unknown.
    pub fn state(&self) -> Option<String> {
        self.value.as_ref().map(ToString::to_string)
    }
}

pub fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
