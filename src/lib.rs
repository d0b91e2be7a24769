pub mod catalog;
pub mod data;
pub mod error;
pub mod geometry;
pub mod planner;
pub mod spatial;
pub mod store;

pub use error::{RouteError, StoreError};
pub use geometry::Point3;
pub use planner::{PathPlanner, PlannedRoute, PlannerConfig};
pub use store::{Locator, PointStore};

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct System {
    pub id: u32,
    pub name: String,
    /// Position in 3D space (light-years, galactic frame)
    pub pos: Point3,
}

impl System {
    pub fn new(id: u32, name: impl Into<String>, pos: Point3) -> Self {
        System {
            id,
            name: name.into(),
            pos,
        }
    }

    pub fn distance(&self, other: &System) -> f64 {
        self.pos.distance(other.pos)
    }

    pub fn distance_to_point(&self, p: Point3) -> f64 {
        self.pos.distance(p)
    }
}
