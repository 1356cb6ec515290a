use aroya_rs::model::Api;
use aroya_rs::normalize::SensorPolicy;
use aroya_rs::sensor::AroyaSensor;
use prometheus::{Encoder, GaugeVec, IntGauge, TextEncoder};

lazy_static! {
    static ref SENSOR_VALUE_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("aroya_sensor_value", "latest reading reported by a sensor"),
        &["device_id", "serial_number", "sensor_type", "unit"],
    )
    .unwrap();
    static ref ENTITIES_GAUGE: IntGauge = register_int_gauge!(opts!(
        "aroya_entities",
        "number of sensor entities created at discovery"
    ))
    .unwrap();
}

/// Refresh every sensor in turn. A sensor failing to refresh keeps its previous value.
pub async fn collect(api: &Api, policy: &SensorPolicy, sensors: &mut [AroyaSensor]) {
    let mut updated = 0;
    for sensor in sensors.iter_mut() {
        if sensor.refresh(api, policy).await {
            updated += 1;
        }
    }
    log::info!("{} of {} sensors updated", updated, sensors.len());
}

/// Feed current sensor values to the Prometheus registry.
pub fn publish(sensors: &[AroyaSensor]) {
    ENTITIES_GAUGE.set(sensors.len() as i64);

    for sensor in sensors {
        SENSOR_VALUE_GAUGE
            .with_label_values(&[
                &sensor.device_id().to_string(),
                sensor.serial_number(),
                sensor.sensor_type(),
                sensor.descriptor().unit_of_measurement.unwrap_or(""),
            ])
            .set(sensor.value());
    }
}

/// Read metrics from Prometheus exporter registry.
pub async fn read() -> Result<String, aroya_rs::Error> {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    encoder
        .encode(&metric_families, &mut buffer)
        .or(Err(aroya_rs::Error::FormatError))?;
    String::from_utf8(buffer).or(Err(aroya_rs::Error::FormatError))
}
