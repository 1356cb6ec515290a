use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Deserialize;
use serde_json::Value;

/// Shared handle to the upstream API. The `client` carries the bearer token and the request
/// timeout, and lives for as long as the poller does.
#[derive(Debug, Clone)]
pub struct Api {
    pub api_url: String,
    pub client: reqwest::Client,
}

/// Upstream device identity. The API hands out numeric ids, but strings are accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceId {
    Number(u64),
    Text(String),
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceId::Number(id) => write!(f, "{}", id),
            DeviceId::Text(id) => f.write_str(id),
        }
    }
}

impl<'de> Deserialize<'de> for DeviceId {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        match Value::deserialize(d)? {
            Value::Number(n) => n
                .as_u64()
                .map(DeviceId::Number)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid device id: {}", n))),
            Value::String(s) => Ok(DeviceId::Text(s)),
            other => Err(serde::de::Error::custom(format!(
                "invalid device id: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: DeviceId,
    pub serial_number: String,
    pub model_key: Option<String>,
}

/// Point in time a reading was taken at, exactly as reported by the API.
///
/// Numeric timestamps compare numerically and always sort before textual ones; textual
/// timestamps compare lexicographically (ISO-8601 strings sort chronologically). Whole numbers
/// within `i64` are kept as `Integer`, every other number as `Float`, so the same instant never
/// has two representations.
#[derive(Debug, Clone)]
pub enum Timestamp {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Timestamp {
    /// Interpret a raw JSON value as a timestamp. Nulls and other shapes are rejected.
    pub fn from_value(value: &Value) -> Option<Timestamp> {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Timestamp::Integer(i)),
                None => n.as_f64().map(Timestamp::from_f64),
            },
            Value::String(s) => Some(Timestamp::Text(s.to_owned())),
            _ => None,
        }
    }

    fn from_f64(f: f64) -> Timestamp {
        if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
            Timestamp::Integer(f as i64)
        } else {
            Timestamp::Float(f)
        }
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Timestamp::Integer(a), Timestamp::Integer(b)) => a.cmp(b),
            (Timestamp::Float(a), Timestamp::Float(b)) => a.total_cmp(b),
            /* never equal across variants, see `from_f64` */
            (Timestamp::Integer(a), Timestamp::Float(b)) => {
                (*a as f64).total_cmp(b).then(Ordering::Less)
            }
            (Timestamp::Float(a), Timestamp::Integer(b)) => {
                a.total_cmp(&(*b as f64)).then(Ordering::Greater)
            }
            (Timestamp::Text(a), Timestamp::Text(b)) => a.cmp(b),
            (Timestamp::Text(_), _) => Ordering::Greater,
            (_, Timestamp::Text(_)) => Ordering::Less,
        }
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Timestamp {}

impl Hash for Timestamp {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Timestamp::Integer(i) => (0u8, i).hash(state),
            Timestamp::Float(f) => (1u8, f.to_bits()).hash(state),
            Timestamp::Text(s) => (2u8, s).hash(state),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub sensor_type: String,
    pub timestamp: Timestamp,
    pub value: f64,
}
