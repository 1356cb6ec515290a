use crate::api::response::get_chart::{FlatReading, Point};
use crate::api::Error;
use crate::model::{Reading, Timestamp};
use serde_json::Value;

use std::collections::HashSet;

pub const DEFAULT_IGNORED_MODELS: &[&str] = &["gateway", "sink"];
pub const DEFAULT_IGNORED_SENSOR_TYPES: &[&str] =
    &["travel_time", "link_quality", "radio_power", "signal", "battery_v"];

/// Sensor types reported in Fahrenheit by the API.
pub const TEMPERATURE_SENSOR_TYPES: &[&str] = &["temperature", "soil_temp", "air_temp"];

/// What to expose and how. Built once from settings and handed to discovery and refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorPolicy {
    pub ignored_models: HashSet<String>,
    pub ignored_sensor_types: HashSet<String>,
    /// Report temperatures in Celsius instead of the Fahrenheit the API delivers.
    pub convert_temperature: bool,
}

impl Default for SensorPolicy {
    fn default() -> Self {
        SensorPolicy {
            ignored_models: DEFAULT_IGNORED_MODELS.iter().map(|s| s.to_string()).collect(),
            ignored_sensor_types: DEFAULT_IGNORED_SENSOR_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            convert_temperature: true,
        }
    }
}

impl SensorPolicy {
    pub fn ignores_model(&self, model_key: Option<&str>) -> bool {
        model_key.map_or(false, |key| self.ignored_models.contains(key))
    }

    pub fn ignores_sensor_type(&self, sensor_type: &str) -> bool {
        self.ignored_sensor_types
            .contains(sensor_type.to_lowercase().as_str())
    }

    /// Convert a raw value of `sensor_type` into the unit it is reported in.
    pub fn convert(&self, sensor_type: &str, value: f64) -> f64 {
        if self.convert_temperature && is_temperature(sensor_type) {
            fahrenheit_to_celsius(value)
        } else {
            value
        }
    }
}

pub fn is_temperature(sensor_type: &str) -> bool {
    TEMPERATURE_SENSOR_TYPES.contains(&sensor_type.to_lowercase().as_str())
}

/// `(f - 32) * 5 / 9`, rounded to two decimals.
pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    let celsius = (fahrenheit - 32.0) * 5.0 / 9.0;
    (celsius * 100.0).round() / 100.0
}

/// Sensor type encoded in a series key like `"temperature:air"`.
fn sensor_type_from_key(key: &str) -> Option<String> {
    key.split(':')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

fn reading(
    sensor_type: &str,
    timestamp: &Value,
    value: &Value,
    policy: &SensorPolicy,
) -> Option<Reading> {
    let timestamp = Timestamp::from_value(timestamp)?;
    let value = value.as_f64()?;
    Some(Reading {
        sensor_type: sensor_type.to_owned(),
        timestamp,
        value: policy.convert(sensor_type, value),
    })
}

fn normalize_series(
    series: &serde_json::Map<String, Value>,
    policy: &SensorPolicy,
) -> Vec<Reading> {
    let mut readings = Vec::new();

    for (key, points) in series {
        let sensor_type = match sensor_type_from_key(key) {
            Some(sensor_type) => sensor_type,
            None => {
                log::warn!("Could not parse sensor_type from key: {:?}", key);
                continue;
            }
        };

        if policy.ignores_sensor_type(&sensor_type) {
            log::debug!("Ignoring sensor type: {}", sensor_type);
            continue;
        }

        let points = match points.as_array() {
            Some(points) => points,
            None => {
                log::error!("Readings for key {} are not a list", key);
                continue;
            }
        };

        for point in points {
            let parsed = serde_json::from_value::<Point>(point.clone())
                .ok()
                .and_then(|p| reading(&sensor_type, &p.x, &p.y, policy));
            match parsed {
                Some(r) => readings.push(r),
                None => log::warn!("Skipping malformed point for key {}: {}", key, point),
            }
        }
    }

    readings
}

fn normalize_flat(records: &[Value], policy: &SensorPolicy) -> Vec<Reading> {
    records
        .iter()
        .filter_map(|record| {
            let flat = match serde_json::from_value::<FlatReading>(record.clone()) {
                Ok(flat) => flat,
                Err(e) => {
                    log::warn!("Skipping malformed reading {}: {}", record, e);
                    return None;
                }
            };

            let sensor_type = flat.sensor_type.to_lowercase();
            if sensor_type.is_empty() || policy.ignores_sensor_type(&sensor_type) {
                log::debug!("Ignoring sensor type: {:?}", sensor_type);
                return None;
            }

            let parsed = reading(&sensor_type, &flat.timestamp, &flat.value, policy);
            if parsed.is_none() {
                log::warn!("Skipping malformed reading {}", record);
            }
            parsed
        })
        .collect()
}

/// Flatten a chart payload into readings.
///
/// Accepts either a mapping from `"<type>:<suffix>"` to `[{x, y}, ..]` series, or an already
/// flat list of `{sensor_type, timestamp, value}` records. Ignored sensor types are dropped and
/// values are converted per `policy`. Any other payload shape is an error.
pub fn normalize(chart: &Value, policy: &SensorPolicy) -> Result<Vec<Reading>, Error> {
    match chart {
        Value::Object(series) => Ok(normalize_series(series, policy)),
        Value::Array(records) => Ok(normalize_flat(records, policy)),
        other => Err(Error::UnexpectedChartFormat(other.to_string())),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::response::test::read_resource;
    use serde_json::json;

    fn chart(name: &str) -> Value {
        serde_json::from_str(&read_resource(name)).unwrap()
    }

    #[test]
    fn series_count_matches_non_ignored_points() {
        let readings = normalize(&chart("chart_series.json"), &SensorPolicy::default()).unwrap();
        /* 3 temperature + 2 humidity + 1 co2; battery_v and signal are ignored */
        assert_eq!(6, readings.len());
    }

    #[test]
    fn ignored_types_never_appear() {
        let policy = SensorPolicy::default();
        for name in &["chart_series.json", "chart_flat.json"] {
            let readings = normalize(&chart(name), &policy).unwrap();
            assert!(readings
                .iter()
                .all(|r| !policy.ignored_sensor_types.contains(&r.sensor_type)));
        }
    }

    #[test]
    fn custom_ignore_set() {
        let policy = SensorPolicy {
            ignored_sensor_types: ["co2", "humidity"].iter().map(|s| s.to_string()).collect(),
            ..SensorPolicy::default()
        };
        let readings = normalize(&chart("chart_series.json"), &policy).unwrap();
        let types: HashSet<&str> = readings.iter().map(|r| r.sensor_type.as_str()).collect();
        assert_eq!(
            ["temperature", "battery_v", "signal"].iter().copied().collect::<HashSet<_>>(),
            types
        );
    }

    #[test]
    fn sensor_type_is_lowercased_key_prefix() {
        let readings = normalize(&json!({"Humidity:air:1": [{"x": 1, "y": 50}]}), &SensorPolicy::default()).unwrap();
        assert_eq!("humidity", readings[0].sensor_type);
        assert_eq!(Timestamp::Integer(1), readings[0].timestamp);
        assert_eq!(50.0, readings[0].value);
    }

    #[test]
    fn empty_key_and_non_list_series_are_skipped() {
        let payload = json!({
            "": [{"x": 1, "y": 1.0}],
            ":suffix": [{"x": 1, "y": 1.0}],
            "co2:air": "not a list",
            "ppfd:top": [{"x": 2, "y": 300.0}]
        });
        let readings = normalize(&payload, &SensorPolicy::default()).unwrap();
        assert_eq!(1, readings.len());
        assert_eq!("ppfd", readings[0].sensor_type);
    }

    #[test]
    fn malformed_points_are_skipped() {
        let payload = json!({"co2:air": [{"x": 1}, {"y": 2}, {"x": true, "y": 3}, "junk", {"x": 4, "y": 400}]});
        let readings = normalize(&payload, &SensorPolicy::default()).unwrap();
        assert_eq!(1, readings.len());
        assert_eq!(Timestamp::Integer(4), readings[0].timestamp);
    }

    #[test]
    fn fractional_epoch_timestamps_are_kept() {
        let payload = json!({"co2:air": [{"x": 1700000000.5, "y": 700}, {"x": 1700000300.0, "y": 710}]});
        let readings = normalize(&payload, &SensorPolicy::default()).unwrap();
        assert_eq!(2, readings.len());
        assert_eq!(Timestamp::Float(1700000000.5), readings[0].timestamp);
        assert_eq!(Timestamp::Integer(1700000300), readings[1].timestamp);
        assert!(readings[1].timestamp > readings[0].timestamp);
    }

    #[test]
    fn flat_list_passes_through() {
        let readings = normalize(&chart("chart_flat.json"), &SensorPolicy::default()).unwrap();
        assert_eq!(3, readings.len());
        assert_eq!(
            Timestamp::Text(String::from("2024-03-01T10:05:00Z")),
            readings[1].timestamp
        );
        /* soil_temp 68F */
        assert_eq!(20.0, readings[2].value);
    }

    #[test]
    fn flat_list_skips_incomplete_records() {
        let payload = json!([
            {"sensor_type": "co2", "timestamp": 1},
            {"timestamp": 1, "value": 2},
            {"sensor_type": "co2", "timestamp": 2, "value": 640}
        ]);
        let readings = normalize(&payload, &SensorPolicy::default()).unwrap();
        assert_eq!(1, readings.len());
        assert_eq!(640.0, readings[0].value);
    }

    #[test]
    fn other_shapes_are_format_errors() {
        let policy = SensorPolicy::default();
        assert!(matches!(
            normalize(&chart("chart_invalid.json"), &policy),
            Err(Error::UnexpectedChartFormat(_))
        ));
        assert!(normalize(&json!(42), &policy).is_err());
        assert!(normalize(&Value::Null, &policy).is_err());
    }

    #[test]
    fn fahrenheit_conversion() {
        assert_eq!(37.0, fahrenheit_to_celsius(98.6));
        assert_eq!(0.0, fahrenheit_to_celsius(32.0));
        assert_eq!(24.0, fahrenheit_to_celsius(75.2));
        assert_eq!(26.67, fahrenheit_to_celsius(80.0));
    }

    #[test]
    fn conversion_can_be_disabled() {
        let policy = SensorPolicy {
            convert_temperature: false,
            ..SensorPolicy::default()
        };
        let readings = normalize(&json!({"air_temp:x": [{"x": 1, "y": 98.6}]}), &policy).unwrap();
        assert_eq!(98.6, readings[0].value);

        let converted = normalize(&json!({"air_temp:x": [{"x": 1, "y": 98.6}]}), &SensorPolicy::default()).unwrap();
        assert_eq!(37.0, converted[0].value);
    }

    #[test]
    fn model_filter() {
        let policy = SensorPolicy::default();
        assert!(policy.ignores_model(Some("gateway")));
        assert!(policy.ignores_model(Some("sink")));
        assert!(!policy.ignores_model(Some("solus")));
        assert!(!policy.ignores_model(None));
    }
}
