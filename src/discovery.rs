use crate::api::{self, Error};
use crate::model::{Api, Device, Reading};
use crate::normalize::{self, SensorPolicy};
use crate::sensor::AroyaSensor;
use serde_json::Value;

use std::collections::BTreeMap;

/// Group readings by sensor type, keeping payload order within each group.
fn group_by_type(readings: &[Reading]) -> BTreeMap<&str, Vec<&Reading>> {
    let mut groups: BTreeMap<&str, Vec<&Reading>> = BTreeMap::new();
    for reading in readings {
        groups
            .entry(reading.sensor_type.as_str())
            .or_default()
            .push(reading);
    }
    groups
}

/// Turn one device's chart payload into one entity per sensor type it reports.
pub fn seed_device(
    device: &Device,
    chart: &Value,
    policy: &SensorPolicy,
) -> Result<Vec<AroyaSensor>, Error> {
    let readings = normalize::normalize(chart, policy)?;

    Ok(group_by_type(&readings)
        .into_iter()
        .filter_map(|(sensor_type, readings)| {
            AroyaSensor::seed(device, sensor_type, &readings, policy)
        })
        .collect())
}

/// Enumerate devices and build their entities.
///
/// A failed device listing yields no entities at all. A device whose chart can't be fetched
/// or understood is skipped; the others still produce entities.
pub async fn discover(api: &Api, policy: &SensorPolicy) -> Vec<AroyaSensor> {
    let devices = match api::devices(api).await {
        Ok(devices) => devices,
        Err(e) => {
            log::error!("Failed to load devices from Aroya API: {}", e);
            return Vec::new();
        }
    };

    let mut sensors = Vec::new();

    for device in devices {
        if policy.ignores_model(device.model_key.as_deref()) {
            log::debug!(
                "Ignoring device {} of model {:?}",
                device.id,
                device.model_key
            );
            continue;
        }

        let chart = match api::chart(api, &device.id).await {
            Ok(chart) => chart,
            Err(e @ Error::InvalidResponse(_, _)) => {
                log::error!("Failed to parse JSON for device {}: {}", device.id, e);
                continue;
            }
            Err(e) => {
                log::warn!("Failed to load chart for device {}: {}", device.id, e);
                continue;
            }
        };

        match seed_device(&device, &chart, policy) {
            Ok(device_sensors) => {
                log::info!(
                    "Device {} ({}): {} sensor(s)",
                    device.id,
                    device.serial_number,
                    device_sensors.len()
                );
                sensors.extend(device_sensors);
            }
            Err(e) => log::error!("Chart data for device {} rejected: {}", device.id, e),
        }
    }

    sensors
}
