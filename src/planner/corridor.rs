//! Straightness of a planned route relative to its best-fit line.

use serde::{Deserialize, Serialize};

use crate::error::RouteError;
use crate::geometry::{fit_line, Line, Point3};
use crate::planner::path::{PlannedRoute, Waypoint};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorridorSample {
    pub system: String,
    /// Foot of the perpendicular from the waypoint onto the corridor axis.
    pub projection: Point3,
    /// Signed position of the projection along the axis, from the centroid.
    pub along: f64,
    /// Lateral distance of the waypoint from the axis.
    pub offset: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteCorridor {
    pub direction: Point3,
    pub support: Point3,
    pub samples: Vec<CorridorSample>,
    pub max_deviation: f64,
}

impl RouteCorridor {
    pub fn from_waypoints(waypoints: &[Waypoint]) -> Result<Self, RouteError> {
        let positions: Vec<Point3> = waypoints.iter().map(|w| w.position).collect();
        let line: Line = fit_line(&positions)?;

        let samples: Vec<CorridorSample> = waypoints
            .iter()
            .map(|w| CorridorSample {
                system: w.system.clone(),
                projection: line.project(w.position),
                along: line.along(w.position),
                offset: line.distance_to(w.position),
            })
            .collect();
        let max_deviation = samples.iter().map(|s| s.offset).fold(0.0, f64::max);

        Ok(RouteCorridor {
            direction: line.direction,
            support: line.support,
            samples,
            max_deviation,
        })
    }
}

impl PlannedRoute {
    /// Fits the corridor through the route's waypoints. Routes with a single
    /// waypoint have no corridor.
    pub fn corridor(&self) -> Result<RouteCorridor, RouteError> {
        RouteCorridor::from_waypoints(self.waypoints())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn waypoint(system: &str, position: Point3) -> Waypoint {
        Waypoint {
            system: system.into(),
            position,
            hop_distance: 0.0,
            remaining_distance: 0.0,
            weight: 0.0,
            density: 0.0,
            snap_error: 0.0,
        }
    }

    #[test]
    fn symmetric_detour_deviation() {
        let corridor = RouteCorridor::from_waypoints(&[
            waypoint("A", Point3::new(0.0, 0.0, 0.0)),
            waypoint("B", Point3::new(50.0, 0.0, 0.0)),
            waypoint("C", Point3::new(100.0, 0.0, 0.0)),
            waypoint("D", Point3::new(50.0, 0.0, 0.0)),
        ])
        .expect("corridor");

        assert_approx_eq!(corridor.direction.x.abs(), 1.0, 1e-9);
        assert_approx_eq!(corridor.max_deviation, 0.0, 1e-9);
        assert_approx_eq!(corridor.samples[2].along.abs(), 50.0, 1e-9);
        assert_eq!(corridor.samples[1].projection.x, 50.0);
    }

    #[test]
    fn off_axis_waypoint_reports_offset() {
        let corridor = RouteCorridor::from_waypoints(&[
            waypoint("A", Point3::new(0.0, 0.0, 0.0)),
            waypoint("B", Point3::new(50.0, 10.0, 0.0)),
            waypoint("C", Point3::new(100.0, 0.0, 0.0)),
            waypoint("D", Point3::new(50.0, -10.0, 0.0)),
        ])
        .expect("corridor");
        assert_approx_eq!(corridor.samples[1].offset, 10.0, 1e-6);
        assert_approx_eq!(corridor.max_deviation, 10.0, 1e-6);
    }

    #[test]
    fn single_waypoint_has_no_corridor() {
        let err = RouteCorridor::from_waypoints(&[waypoint("A", Point3::ORIGIN)]).unwrap_err();
        assert!(matches!(err, RouteError::DegenerateGeometry(_)));
    }
}
