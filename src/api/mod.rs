pub mod endpoint;
pub mod error;
pub mod response;

use crate::model;
use crate::normalize::SensorPolicy;
pub use error::Error;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Url;
use response::get_device_list::{Data, GetDevicesList};
use serde_json::Value;

use std::collections::BTreeMap;
use std::time::Duration;

/// Build the shared API handle. The bearer token and the timeout are baked into the client, so
/// every request made through it is authenticated and bounded.
pub fn api(api_url: String, api_key: &str, timeout: Duration) -> Result<model::Api, Error> {
    let mut token = HeaderValue::from_str(&format!("Bearer {}", api_key))
        .map_err(|e| Error::ConfigError(format!("invalid API key: {}", e)))?;
    token.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, token);

    let client = reqwest::ClientBuilder::new()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .or(Err(Error::InternalError))?;

    Ok(model::Api {
        api_url: api_url.trim_end_matches('/').to_owned(),
        client,
    })
}

/// Map failed request or Non-200 API response to Error
fn map_api_err(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        return Error::Timeout(error.to_string());
    }

    match error.status() {
        Some(http::StatusCode::TOO_MANY_REQUESTS) => Error::RateExceeded(error.to_string()),
        Some(http::StatusCode::UNAUTHORIZED) | Some(http::StatusCode::FORBIDDEN) => {
            Error::LoginError(error.to_string())
        }
        Some(status) => Error::HttpStatus(status.as_u16()),
        None => Error::ApiError(error.to_string()),
    }
}

async fn get(api: &model::Api, url: Url) -> Result<Value, Error> {
    log::trace!("GET {}", url);

    let text = api
        .client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(map_api_err)?
        .text()
        .await
        .map_err(map_api_err)?;

    log::trace!("response_text: {}", text);

    serde_json::from_str::<Value>(&text).map_err(|e| Error::InvalidResponse(text, e.to_string()))
}

/// List all devices visible to the API key. Entries that can't be read are logged and skipped.
pub async fn devices(api: &model::Api) -> Result<Vec<model::Device>, Error> {
    let url = endpoint::devices(&api.api_url)?;

    get(api, url)
        .await
        .map(serde_json::from_value::<GetDevicesList>)?
        .or(Err(Error::UnexpectedApiResponse))
        .map(|response| {
            response
                .results
                .into_iter()
                .filter_map(|entry| match serde_json::from_value::<Data>(entry.clone()) {
                    Ok(resp) => Some(resp),
                    Err(e) => {
                        log::warn!("Skipping unreadable device entry {}: {}", entry, e);
                        None
                    }
                })
                .map(|resp| {
                    let id = resp.id;
                    model::Device {
                        serial_number: resp.serial_number.unwrap_or_else(|| id.to_string()),
                        id,
                        model_key: resp.model_key,
                    }
                })
                .collect()
        })
}

/// Raw chart payload of `device`. The shape is not checked here, see `normalize::normalize`.
pub async fn chart(api: &model::Api, device_id: &model::DeviceId) -> Result<Value, Error> {
    get(api, endpoint::chart(&api.api_url, device_id)?).await
}

/// Dump device charts
///
/// Fetch raw chart JSON of every device not ignored by `policy`, keyed by device id. Meant for
/// inspecting payload shapes; a device whose chart can't be fetched is reported inline.
pub async fn dump_charts(
    api: &model::Api,
    policy: &SensorPolicy,
) -> Result<BTreeMap<String, Value>, Error> {
    let mut dump = BTreeMap::new();

    for device in devices(api).await? {
        if policy.ignores_model(device.model_key.as_deref()) {
            continue;
        }

        let value = match chart(api, &device.id).await {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Failed to load chart for device {}: {}", device.id, e);
                Value::String(e.to_string())
            }
        };
        dump.insert(device.id.to_string(), value);
    }

    Ok(dump)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::response::test::read_resource;
    use mockito::Server;

    fn test_api(url: String) -> model::Api {
        api(url, "test_token", Duration::from_secs(15)).unwrap()
    }

    #[tokio::test]
    async fn devices_falls_back_to_id_for_serial() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/devices")
            .match_header("authorization", "Bearer test_token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(read_resource("devices.json"))
            .create_async()
            .await;

        let devices = devices(&test_api(server.url())).await.unwrap();

        assert_eq!(4, devices.len());
        assert_eq!("SN-0101", devices[0].serial_number);
        assert_eq!("103", devices[2].serial_number);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn one_unreadable_device_does_not_sink_the_listing() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/devices")
            .with_status(200)
            .with_body(
                serde_json::json!({"results": [
                    {"id": 1, "serialNumber": "SN-1", "modelKey": "solus"},
                    {"id": 2, "serialNumber": 20002, "modelKey": "solus"},
                    {"id": null, "serialNumber": "SN-3"},
                    {"id": 4, "serialNumber": ["SN-4"]}
                ]})
                .to_string(),
            )
            .create_async()
            .await;

        let devices = devices(&test_api(server.url())).await.unwrap();

        assert_eq!(2, devices.len());
        assert_eq!("SN-1", devices[0].serial_number);
        assert_eq!(model::DeviceId::Number(2), devices[1].id);
        assert_eq!("20002", devices[1].serial_number);
    }

    #[tokio::test]
    async fn text_device_id_is_encoded_in_chart_path() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/devices/a%2Fb%20c/chart")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let result = chart(
            &test_api(server.url()),
            &model::DeviceId::Text(String::from("a/b c")),
        )
        .await
        .unwrap();

        assert_eq!(Value::Array(Vec::new()), result);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/devices/7/chart")
            .with_status(500)
            .create_async()
            .await;

        let result = chart(&test_api(server.url()), &model::DeviceId::Number(7)).await;
        assert!(matches!(result, Err(Error::HttpStatus(500))));
    }

    #[tokio::test]
    async fn unauthorized_maps_to_login_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/devices")
            .with_status(401)
            .create_async()
            .await;

        let result = devices(&test_api(server.url())).await;
        assert!(matches!(result, Err(Error::LoginError(_))));
    }

    #[tokio::test]
    async fn malformed_json_is_invalid_response() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/devices")
            .with_status(200)
            .with_body("{not json")
            .create_async()
            .await;

        let result = devices(&test_api(server.url())).await;
        assert!(matches!(result, Err(Error::InvalidResponse(_, _))));
    }

    #[tokio::test]
    async fn devices_with_wrong_envelope() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/devices")
            .with_status(200)
            .with_body(r#"{"results": "nope"}"#)
            .create_async()
            .await;

        let result = devices(&test_api(server.url())).await;
        assert!(matches!(result, Err(Error::UnexpectedApiResponse)));
    }

    #[tokio::test]
    async fn dump_charts_skips_ignored_models() {
        let mut server = Server::new_async().await;
        let _devices = server
            .mock("GET", "/devices")
            .with_status(200)
            .with_body(read_resource("devices.json"))
            .create_async()
            .await;
        let _chart_101 = server
            .mock("GET", "/devices/101/chart")
            .with_status(200)
            .with_body(read_resource("chart_series.json"))
            .create_async()
            .await;
        let _chart_103 = server
            .mock("GET", "/devices/103/chart")
            .with_status(404)
            .create_async()
            .await;

        let dump = dump_charts(&test_api(server.url()), &SensorPolicy::default())
            .await
            .unwrap();

        assert_eq!(vec!["101", "103"], dump.keys().collect::<Vec<_>>());
        assert!(dump["101"].is_object());
        assert_eq!(Value::String(String::from("HTTP 404")), dump["103"]);
    }
}
