#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate prometheus;
#[macro_use]
extern crate rocket;

use aroya_rs::model::Api;
use aroya_rs::normalize::SensorPolicy;
use aroya_rs::sensor::{AroyaSensor, EntityState};
use aroya_rs::settings::Settings;
use aroya_rs::{api, discovery};
use rocket::serde::json::Json;
use rocket::{Build, Rocket, State};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Instant;

mod metrics;

/// Structure containing state for API handlers.
pub struct StateData {
    api: Api,
    policy: SensorPolicy,
    interval: u64,
    /// Timestamp of last refresh cycle via `metrics::collect()`
    timestamp: Mutex<Option<Instant>>,
    /// Entities created at discovery. Held across a whole refresh cycle, so refreshes of the
    /// same sensor never overlap.
    sensors: tokio::sync::Mutex<Vec<AroyaSensor>>,
}

impl StateData {
    /// Updates `timestamp` to `now()`.
    fn touch(&self) {
        if let Ok(mut ts) = self.timestamp.lock() {
            *ts = Some(Instant::now());
        } else {
            log::trace!("Unable to lock timestamp mutex, will refresh again")
        }
    }

    /// Checks whether `interval_seconds` elapsed since last `touch()`
    fn interval_elapsed(&self, interval_secs: u64) -> bool {
        let elapsed_opt = self
            .timestamp
            .lock()
            .ok()
            .and_then(|a| a.map(|b| b.elapsed().as_secs()));

        if let Some(elapsed) = elapsed_opt {
            elapsed > interval_secs
        } else {
            /* If there is None timestamp/elapsed, always return true to trigger action */
            true
        }
    }
}

#[get("/metrics")]
async fn metrics_route(state: &State<StateData>) -> Result<String, api::Error> {
    let mut sensors = state.sensors.lock().await;

    if state.interval_elapsed(state.interval) {
        metrics::collect(&state.api, &state.policy, &mut sensors).await;
        state.touch();
    } else {
        log::info!("interval time not yet elapsed since last run; returning cached result")
    }

    metrics::publish(&sensors);
    metrics::read().await
}

#[get("/entities")]
async fn entities_route(state: &State<StateData>) -> Json<Vec<EntityState>> {
    let sensors = state.sensors.lock().await;
    Json(sensors.iter().map(AroyaSensor::state).collect())
}

#[get("/dump-charts")]
async fn dump_charts_route(state: &State<StateData>) -> Result<Json<BTreeMap<String, Value>>, api::Error> {
    api::dump_charts(&state.api, &state.policy).await.map(Json)
}

#[launch]
async fn rocket() -> Rocket<Build> {
    env_logger::init();

    let settings = Settings::from_env().unwrap_or_else(|e| {
        log::error!("{}", e);
        std::process::exit(1);
    });
    let api = api::api(settings.api_url.to_owned(), &settings.api_key, settings.timeout())
        .unwrap_or_else(|e| {
            log::error!("{}", e);
            std::process::exit(1);
        });
    let policy = settings.policy();

    let sensors = discovery::discover(&api, &policy).await;
    log::info!("Discovered {} sensor(s)", sensors.len());

    build(StateData {
        api,
        policy,
        interval: settings.interval,
        timestamp: Mutex::new(Some(Instant::now())),
        sensors: tokio::sync::Mutex::new(sensors),
    })
}

fn build(state: StateData) -> Rocket<Build> {
    rocket::build()
        .manage(state)
        .mount("/", routes![metrics_route, entities_route, dump_charts_route])
}
