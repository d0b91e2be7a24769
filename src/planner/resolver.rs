//! Turns a scored cube into a concrete system.

use log::trace;

use crate::error::RouteError;
use crate::geometry::Point3;
use crate::planner::config::PlannerConfig;
use crate::store::{NearbySystem, PointStore};

/// Radius schedule of one resolution attempt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolverSettings {
    pub initial_radius: f64,
    pub step: f64,
    pub cap: f64,
    pub limit: usize,
}

impl ResolverSettings {
    /// Start at one cube edge and grow by one edge up to the configured cap.
    pub fn for_cube(cube_side: f64, config: &PlannerConfig) -> Self {
        ResolverSettings {
            initial_radius: cube_side,
            step: cube_side,
            cap: config.radius_cap(cube_side),
            limit: config.nearest_limit,
        }
    }
}

/// Nearest system to `center` that passes `accept`, searching at growing radii.
///
/// When every system of a full result page is rejected the page is widened
/// before the radius grows, so rejected neighbours never mask farther ones.
///
/// Only reads from the store, so repeated calls against an unchanged store
/// return the same system.
pub fn resolve_waypoint<S, F>(
    store: &S,
    center: Point3,
    settings: &ResolverSettings,
    accept: F,
) -> Result<NearbySystem, RouteError>
where
    S: PointStore + ?Sized,
    F: Fn(&NearbySystem) -> bool,
{
    let mut radius = settings.initial_radius;
    let mut limit = settings.limit.max(1);
    while radius <= settings.cap {
        let found = store
            .nearest_points(center, radius, limit)
            .map_err(|err| err.into_unavailable())?;
        trace!("{} systems within {radius:.1} of {center:?}", found.len());
        let returned = found.len();
        if let Some(hit) = found.into_iter().find(|n| accept(n)) {
            return Ok(hit);
        }
        // a full page of rejects may hide acceptable systems at this radius
        if returned >= limit {
            limit += returned;
            continue;
        }
        if settings.step <= 0.0 {
            break;
        }
        radius += settings.step;
    }

    Err(RouteError::NoCandidateFound {
        center,
        radius: settings.cap,
    })
}
