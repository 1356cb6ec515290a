use crate::api;
use crate::model::{Api, Device, DeviceId, Reading, Timestamp};
use crate::normalize::{self, SensorPolicy};
use serde::Serialize;

use std::collections::HashSet;

const DEFAULT_ICON: &str = "mdi:leaf-circle";
const STATE_CLASS_MEASUREMENT: &str = "measurement";

/// Static presentation of a sensor type: unit, device class and icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub unit_of_measurement: Option<&'static str>,
    pub device_class: Option<&'static str>,
    pub state_class: &'static str,
    pub icon: &'static str,
}

impl Descriptor {
    pub fn for_sensor_type(sensor_type: &str, policy: &SensorPolicy) -> Descriptor {
        let (unit, device_class, icon): (Option<&'static str>, Option<&'static str>, &'static str) =
            match sensor_type.to_lowercase().as_str() {
                "temperature" | "soil_temp" | "air_temp" => (
                    Some(if policy.convert_temperature { "°C" } else { "°F" }),
                    Some("temperature"),
                    "mdi:thermometer",
                ),
                "humidity" | "rel_hum" | "soil_moist" => {
                    (Some("%"), Some("humidity"), "mdi:water-percent")
                }
                "abs_hum" => (Some("g/m³"), Some("humidity"), "mdi:water"),
                "co2" => (Some("ppm"), Some("carbon_dioxide"), "mdi:molecule-co2"),
                "ppfd" => (
                    Some("µmol/m²/s"),
                    Some("illuminance"),
                    "mdi:weather-sunny-alert",
                ),
                "pore_ec" => (Some("mS/cm"), Some("voltage"), DEFAULT_ICON),
                _ => (None, None, DEFAULT_ICON),
            };

        Descriptor {
            unit_of_measurement: unit,
            device_class,
            state_class: STATE_CLASS_MEASUREMENT,
            icon,
        }
    }
}

/// Reading with the highest timestamp. On ties the one appearing last wins.
pub fn latest<'a, I>(readings: I) -> Option<&'a Reading>
where
    I: IntoIterator<Item = &'a Reading>,
{
    readings.into_iter().max_by(|a, b| a.timestamp.cmp(&b.timestamp))
}

/// "soil_temp" -> "Soil_temp"
fn capitalize(s: &str) -> String {
    let lower = s.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Latest value of one sensor type of one device.
#[derive(Debug, Clone)]
pub struct AroyaSensor {
    serial_number: String,
    device_id: DeviceId,
    sensor_type: String,
    value: f64,
    seen_timestamps: HashSet<Timestamp>,
    descriptor: Descriptor,
}

/// Entity state as handed to the host.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EntityState {
    pub name: String,
    pub unique_id: String,
    pub state: f64,
    pub unit_of_measurement: Option<&'static str>,
    pub device_class: Option<&'static str>,
    pub state_class: &'static str,
    pub icon: &'static str,
}

impl AroyaSensor {
    /// Seed an entity from the readings of `sensor_type` seen at discovery. Every timestamp in
    /// `readings` is marked as seen. Returns `None` when there is nothing to seed from.
    pub fn seed(
        device: &Device,
        sensor_type: &str,
        readings: &[&Reading],
        policy: &SensorPolicy,
    ) -> Option<AroyaSensor> {
        let current = latest(readings.iter().copied())?;

        Some(AroyaSensor {
            serial_number: device.serial_number.to_owned(),
            device_id: device.id.clone(),
            sensor_type: sensor_type.to_owned(),
            value: current.value,
            seen_timestamps: readings.iter().map(|r| r.timestamp.clone()).collect(),
            descriptor: Descriptor::for_sensor_type(sensor_type, policy),
        })
    }

    pub fn name(&self) -> String {
        format!("{} {}", self.serial_number, capitalize(&self.sensor_type))
    }

    pub fn unique_id(&self) -> String {
        format!("aroya_{}_{}", self.device_id, self.sensor_type)
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn sensor_type(&self) -> &str {
        &self.sensor_type
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn seen_timestamps(&self) -> &HashSet<Timestamp> {
        &self.seen_timestamps
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn state(&self) -> EntityState {
        EntityState {
            name: self.name(),
            unique_id: self.unique_id(),
            state: self.value,
            unit_of_measurement: self.descriptor.unit_of_measurement,
            device_class: self.descriptor.device_class,
            state_class: self.descriptor.state_class,
            icon: self.descriptor.icon,
        }
    }

    /// Advance to the newest reading of this entity's type not seen before.
    ///
    /// Readings of other types and already seen timestamps are ignored. Returns whether the
    /// value changed hands to a new reading; `seen_timestamps` only ever grows.
    pub fn apply(&mut self, readings: &[Reading]) -> bool {
        let fresh: Vec<&Reading> = readings
            .iter()
            .filter(|r| r.sensor_type == self.sensor_type)
            .filter(|r| !self.seen_timestamps.contains(&r.timestamp))
            .collect();

        let newest = match latest(fresh.iter().copied()) {
            Some(newest) => newest,
            None => return false,
        };

        self.value = newest.value;
        self.seen_timestamps
            .extend(fresh.iter().map(|r| r.timestamp.clone()));
        true
    }

    /// Re-fetch the device chart and apply whatever is new. Failures are logged and leave the
    /// entity untouched.
    pub async fn refresh(&mut self, api: &Api, policy: &SensorPolicy) -> bool {
        let chart = match api::chart(api, &self.device_id).await {
            Ok(chart) => chart,
            Err(e) => {
                log::warn!("Failed to update {}: {}", self.name(), e);
                return false;
            }
        };

        match normalize::normalize(&chart, policy) {
            Ok(readings) => {
                let updated = self.apply(&readings);
                if updated {
                    log::debug!("{} updated to {}", self.name(), self.value);
                }
                updated
            }
            Err(e) => {
                log::error!("Update data for {} rejected: {}", self.name(), e);
                false
            }
        }
    }
}
