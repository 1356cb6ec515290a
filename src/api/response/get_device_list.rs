use crate::model::DeviceId;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// `serialNumber` shows up as a string or as a bare number.
fn serial_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "invalid serial number: {}",
            other
        ))),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Data {
    pub id: DeviceId,
    #[serde(default, deserialize_with = "serial_number")]
    pub serial_number: Option<String>,
    pub model_key: Option<String>,
}

/* Entries are kept raw so one unreadable device doesn't sink the whole listing */
#[derive(Deserialize)]
pub struct GetDevicesList {
    #[serde(default)]
    pub results: Vec<Value>,
}
