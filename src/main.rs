use std::collections::BTreeMap;
use std::env;

use lambda_runtime::{service_fn, Error, LambdaEvent};
use log::{info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use starmap_router::catalog::StarCatalog;
use starmap_router::data::read_catalog_from_file;
use starmap_router::planner::{HopDiagnostics, PathPlanner, PlannerConfig, Waypoint};
use starmap_router::store::{CachedStore, InMemoryStore, NearbySystem, SystemRef};
use starmap_router::{Locator, Point3, PointStore, System};

const DATASET_ENV: &str = "STARMAP_DATASET";
const CONFIG_ENV: &str = "STARMAP_PLANNER_CONFIG";
const STORE_CACHE_CAPACITY: usize = 4096;

fn load_catalog() -> StarCatalog {
    if let Ok(path) = env::var(DATASET_ENV) {
        match read_catalog_from_file(&path) {
            Ok(catalog) => {
                info!("Loaded {} systems from {path}", catalog.len());
                return catalog;
            }
            Err(err) => warn!("Failed to load dataset {path}: {err}; using sample catalog"),
        }
    }
    // Tiny demo catalog; point STARMAP_DATASET at a built dataset in production.
    StarCatalog::new(vec![
        System::new(1, "Sol", Point3::new(0.0, 0.0, 0.0)),
        System::new(2, "Relay", Point3::new(50.0, 0.0, 0.0)),
        System::new(3, "Beacon", Point3::new(100.0, 0.0, 0.0)),
        System::new(4, "Outpost", Point3::new(0.0, 20.0, 0.0)),
    ])
}

static STORE: Lazy<CachedStore<InMemoryStore>> =
    Lazy::new(|| CachedStore::new(InMemoryStore::new(load_catalog()), STORE_CACHE_CAPACITY));

static CONFIG: Lazy<PlannerConfig> = Lazy::new(|| match env::var(CONFIG_ENV) {
    Ok(path) => PlannerConfig::from_file(&path).unwrap_or_else(|err| {
        warn!("Ignoring planner config {path}: {err}");
        PlannerConfig::default()
    }),
    Err(_) => PlannerConfig::default(),
});

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum EngineRequest {
    Route {
        start: Locator,
        target: Locator,
        #[serde(default)]
        config: Option<Value>,
        #[serde(default)]
        jump_range: Option<f64>,
    },
    Nearest {
        origin: Point3,
        radius: f64,
        count: usize,
    },
    Resolve {
        system: Locator,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum EngineResponse {
    Route {
        waypoints: Vec<Waypoint>,
        remaining_distance: f64,
        arrived: bool,
        estimated_jumps: Option<usize>,
        diagnostics: BTreeMap<String, HopDiagnostics>,
    },
    Nearest {
        systems: Vec<NearbySystem>,
    },
    Resolve {
        system: SystemRef,
    },
    Error {
        message: String,
    },
}

fn plan_route(
    start: Locator,
    target: Locator,
    overrides: Option<Value>,
    jump_range: Option<f64>,
) -> EngineResponse {
    if let Some(range) = jump_range {
        if !(range.is_finite() && range > 0.0) {
            return EngineResponse::Error {
                message: format!("jump_range must be a positive number, got {range}"),
            };
        }
    }
    let config = match overrides {
        Some(patch) => match CONFIG.with_overrides(&patch) {
            Ok(config) => config,
            Err(err) => return EngineResponse::Error { message: err.to_string() },
        },
        None => CONFIG.clone(),
    };
    let planner = match PathPlanner::new(&*STORE, config) {
        Ok(planner) => planner,
        Err(err) => return EngineResponse::Error { message: err.to_string() },
    };

    match planner.plan(&start, &target) {
        Ok(route) => EngineResponse::Route {
            remaining_distance: route.remaining_distance(),
            arrived: route.arrived(0.0),
            estimated_jumps: jump_range.and_then(|range| route.estimated_jumps(range)),
            waypoints: route.waypoints().to_vec(),
            diagnostics: route.diagnostics,
        },
        Err(err) => EngineResponse::Error { message: err.to_string() },
    }
}

async fn handler(event: LambdaEvent<EngineRequest>) -> Result<EngineResponse, Error> {
    let req = event.payload;
    match req {
        EngineRequest::Route { start, target, config, jump_range } => {
            let response =
                tokio::task::spawn_blocking(move || plan_route(start, target, config, jump_range))
                    .await?;
            Ok(response)
        }
        EngineRequest::Nearest { origin, radius, count } => {
            match STORE.nearest_points(origin, radius, count) {
                Ok(systems) => Ok(EngineResponse::Nearest { systems }),
                Err(err) => Ok(EngineResponse::Error { message: err.to_string() }),
            }
        }
        EngineRequest::Resolve { system } => match STORE.resolve_point(&system) {
            Ok(system) => Ok(EngineResponse::Resolve { system }),
            Err(err) => Ok(EngineResponse::Error { message: err.to_string() }),
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();
    let func = service_fn(handler);
    lambda_runtime::run(func).await
}
