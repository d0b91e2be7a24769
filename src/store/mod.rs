//! Point store contract consumed by the planner, plus its backends.

pub mod cache;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::geometry::Point3;

pub use cache::{BoundedCache, CachedStore};
pub use memory::InMemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// Search radius used when a coordinate locator is resolved to a system.
pub const DEFAULT_RESOLVE_RADIUS: f64 = 40.0;

/// How a caller names a system: by catalog name or by approximate position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Locator {
    Name(String),
    Coordinates(Point3),
}

impl From<&str> for Locator {
    fn from(name: &str) -> Self {
        Locator::Name(name.to_string())
    }
}

impl From<Point3> for Locator {
    fn from(p: Point3) -> Self {
        Locator::Coordinates(p)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Name(name) => f.write_str(name),
            Locator::Coordinates(p) => write!(f, "({:.2}, {:.2}, {:.2})", p.x, p.y, p.z),
        }
    }
}

/// A resolved system: identifier plus position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemRef {
    pub name: String,
    pub position: Point3,
}

/// A system returned by a radius query together with its distance to the query center.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NearbySystem {
    #[serde(flatten)]
    pub system: SystemRef,
    pub distance: f64,
}

/// One non-empty grid cube returned by a region aggregate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionCell {
    pub center: Point3,
    pub count: u32,
    /// Distance from the mean position of the cube's systems to the target.
    pub centroid_distance: f64,
}

/// Read-only access to a star field.
///
/// Implementations must tolerate concurrent callers without external locking.
pub trait PointStore: Send + Sync {
    fn resolve_point(&self, locator: &Locator) -> Result<SystemRef, StoreError>;

    /// Grouped density over the inclusive box `[min, max]` at grid edge
    /// `cube_side`. Cubes without systems are omitted.
    fn aggregate_region(
        &self,
        min: Point3,
        max: Point3,
        cube_side: f64,
        target: Point3,
    ) -> Result<Vec<RegionCell>, StoreError>;

    /// Up to `limit` systems within `radius` of `center`, nearest first.
    fn nearest_points(
        &self,
        center: Point3,
        radius: f64,
        limit: usize,
    ) -> Result<Vec<NearbySystem>, StoreError>;
}

impl<S: PointStore + ?Sized> PointStore for &S {
    fn resolve_point(&self, locator: &Locator) -> Result<SystemRef, StoreError> {
        (**self).resolve_point(locator)
    }

    fn aggregate_region(
        &self,
        min: Point3,
        max: Point3,
        cube_side: f64,
        target: Point3,
    ) -> Result<Vec<RegionCell>, StoreError> {
        (**self).aggregate_region(min, max, cube_side, target)
    }

    fn nearest_points(
        &self,
        center: Point3,
        radius: f64,
        limit: usize,
    ) -> Result<Vec<NearbySystem>, StoreError> {
        (**self).nearest_points(center, radius, limit)
    }
}

/// Buckets positions into grid cubes of edge `cube_side`, ordered by cube index.
pub fn bucket_positions<I>(positions: I, cube_side: f64, target: Point3) -> Vec<RegionCell>
where
    I: IntoIterator<Item = Point3>,
{
    let mut buckets: BTreeMap<[i64; 3], (u32, Point3)> = BTreeMap::new();
    for p in positions {
        let entry = buckets
            .entry(p.cube_index(cube_side))
            .or_insert((0, Point3::ORIGIN));
        entry.0 += 1;
        entry.1 = entry.1 + p;
    }

    buckets
        .into_iter()
        .map(|(index, (count, sum))| {
            let centroid = sum * (1.0 / f64::from(count));
            RegionCell {
                center: cube_center_of_index(index, cube_side),
                count,
                centroid_distance: centroid.distance(target),
            }
        })
        .collect()
}

pub(crate) fn cube_center_of_index(index: [i64; 3], cube_side: f64) -> Point3 {
    let c = |i: i64| i as f64 * cube_side + cube_side / 2.0;
    Point3::new(c(index[0]), c(index[1]), c(index[2]))
}
