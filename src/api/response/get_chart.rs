use serde::Deserialize;
use serde_json::Value;

/* Dict-shaped chart: `{"<type>:<suffix>": [{"x": .., "y": ..}, ..]}` */
#[derive(Deserialize)]
pub struct Point {
    #[serde(default)]
    pub x: Value,
    #[serde(default)]
    pub y: Value,
}

/* List-shaped chart: already flat reading records */
#[derive(Deserialize)]
pub struct FlatReading {
    pub sensor_type: String,
    pub timestamp: Value,
    pub value: Value,
}
