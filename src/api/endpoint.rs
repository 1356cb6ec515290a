use crate::api::Error;
use crate::model::DeviceId;
use reqwest::Url;

pub const DEVICES: &str = "devices";
pub const CHART: &str = "chart";

/// `api_url` with `segments` appended as path segments, each percent-encoded.
fn url(api_url: &str, segments: &[&str]) -> Result<Url, Error> {
    let mut url = Url::parse(api_url)
        .map_err(|e| Error::ConfigError(format!("invalid API URL {}: {}", api_url, e)))?;

    url.path_segments_mut()
        .map_err(|_| Error::ConfigError(format!("API URL can't take a path: {}", api_url)))?
        .pop_if_empty()
        .extend(segments);

    Ok(url)
}

/// `{api_url}/devices`
pub fn devices(api_url: &str) -> Result<Url, Error> {
    url(api_url, &[DEVICES])
}

/// `{api_url}/devices/{id}/chart`
pub fn chart(api_url: &str, device_id: &DeviceId) -> Result<Url, Error> {
    url(api_url, &[DEVICES, &device_id.to_string(), CHART])
}
