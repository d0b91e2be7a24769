//! Density lattice over an axis-aligned region.

use std::collections::HashMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::RouteError;
use crate::geometry::Point3;
use crate::store::{cube_center_of_index, PointStore};

/// Axis-aligned box, bounds inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point3,
    pub max: Point3,
}

impl BoundingBox {
    pub fn new(a: Point3, b: Point3) -> Self {
        BoundingBox {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Grid indices of every cube of edge `side` that intersects the box,
    /// x-major order.
    pub fn lattice_indices(&self, side: f64) -> Vec<[i64; 3]> {
        let lo = self.min.cube_index(side);
        let hi = self.max.cube_index(side);
        let mut indices = Vec::with_capacity(self.lattice_len(side));
        for ix in lo[0]..=hi[0] {
            for iy in lo[1]..=hi[1] {
                for iz in lo[2]..=hi[2] {
                    indices.push([ix, iy, iz]);
                }
            }
        }
        indices
    }

    pub fn lattice_len(&self, side: f64) -> usize {
        let lo = self.min.cube_index(side);
        let hi = self.max.cube_index(side);
        (0..3)
            .map(|a| (hi[a] - lo[a] + 1).max(0) as usize)
            .product()
    }
}

/// One grid cell at a given resolution.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cube {
    pub center: Point3,
    pub side: f64,
    pub count: u32,
    pub centroid_distance: f64,
    pub weight: f64,
}

impl Cube {
    /// Distance from the center to a corner.
    pub fn circumradius(&self) -> f64 {
        self.side * 3f64.sqrt() / 2.0
    }

    /// Measures the cube against `target` using its geometric center.
    pub fn rebase(&mut self, target: Point3) {
        self.centroid_distance = self.center.distance(target);
        self.weight = density_weight(self.count, self.centroid_distance);
    }
}

/// `ln(3 + count) × distance`: sparse, near cubes weigh least.
pub fn density_weight(count: u32, distance: f64) -> f64 {
    (3.0 + f64::from(count)).ln() * distance
}

/// Every cube covering a box at a fixed edge length, empty ones included.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    pub side: f64,
    pub cubes: Vec<Cube>,
}

impl Lattice {
    pub fn len(&self) -> usize {
        self.cubes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cubes.is_empty()
    }

    pub fn total_count(&self) -> u64 {
        self.cubes.iter().map(|c| u64::from(c.count)).sum()
    }

    pub fn rebase(&mut self, target: Point3) {
        for cube in &mut self.cubes {
            cube.rebase(target);
        }
    }
}

/// Builds the lattice for `region` and fills it from the store's aggregate.
///
/// Store rows only populate non-empty cubes; all other cubes default to a
/// zero count measured from their geometric center. Weights are recomputed
/// after the join. Zero rows is a valid, empty region.
pub fn aggregate_grid<S: PointStore + ?Sized>(
    store: &S,
    region: &BoundingBox,
    cube_side: f64,
    target: Point3,
) -> Result<Lattice, RouteError> {
    let rows = store
        .aggregate_region(region.min, region.max, cube_side, target)
        .map_err(|err| err.into_unavailable())?;

    let mut by_index: HashMap<[i64; 3], _> = HashMap::with_capacity(rows.len());
    for row in rows {
        by_index.insert(row.center.cube_index(cube_side), row);
    }

    let indices = region.lattice_indices(cube_side);
    let mut joined = 0usize;
    let cubes: Vec<Cube> = indices
        .into_iter()
        .map(|index| {
            let center = cube_center_of_index(index, cube_side);
            let (count, centroid_distance) = match by_index.remove(&index) {
                Some(row) => {
                    joined += 1;
                    (row.count, row.centroid_distance)
                }
                None => (0, center.distance(target)),
            };
            Cube {
                center,
                side: cube_side,
                count,
                centroid_distance,
                weight: density_weight(count, centroid_distance),
            }
        })
        .collect();

    if !by_index.is_empty() {
        warn!(
            "{} aggregate rows fell outside the requested lattice and were dropped",
            by_index.len()
        );
    }
    debug!(
        "lattice @ {cube_side}: {} cubes, {joined} populated",
        cubes.len()
    );

    Ok(Lattice {
        side: cube_side,
        cubes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{InMemoryStore, Locator, NearbySystem, RegionCell, SystemRef};
    use crate::System;
    use std::collections::HashSet;

    struct FailingStore;

    impl PointStore for FailingStore {
        fn resolve_point(&self, locator: &Locator) -> Result<SystemRef, StoreError> {
            Err(StoreError::NotFound(locator.to_string()))
        }

        fn aggregate_region(
            &self,
            _min: Point3,
            _max: Point3,
            _cube_side: f64,
            _target: Point3,
        ) -> Result<Vec<RegionCell>, StoreError> {
            Err(StoreError::Backend("connection reset".into()))
        }

        fn nearest_points(
            &self,
            _center: Point3,
            _radius: f64,
            _limit: usize,
        ) -> Result<Vec<NearbySystem>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn scattered_store() -> InMemoryStore {
        let systems = (0..60)
            .map(|i| {
                let f = i as f64;
                System::new(
                    i,
                    format!("S{i}"),
                    Point3::new((f * 37.0) % 200.0 - 100.0, (f * 53.0) % 90.0, (f * 11.0) % 70.0 - 35.0),
                )
            })
            .collect();
        InMemoryStore::from_systems(systems)
    }

    #[test]
    fn outer_join_covers_every_cube_once() {
        let store = scattered_store();
        for (region, side) in [
            (BoundingBox::new(Point3::new(-100.0, 0.0, -40.0), Point3::new(100.0, 90.0, 40.0)), 20.0),
            (BoundingBox::new(Point3::new(-30.0, -30.0, -30.0), Point3::new(31.0, 31.0, 31.0)), 24.0),
            (BoundingBox::new(Point3::new(500.0, 500.0, 500.0), Point3::new(560.0, 540.0, 520.0)), 40.0),
        ] {
            let lattice = aggregate_grid(&store, &region, side, Point3::ORIGIN).expect("lattice");
            assert_eq!(lattice.len(), region.lattice_len(side));

            let unique: HashSet<[i64; 3]> =
                lattice.cubes.iter().map(|c| c.center.cube_index(side)).collect();
            assert_eq!(unique.len(), lattice.len());
        }
    }

    #[test]
    fn counts_match_store_and_empty_cubes_default() {
        let store = InMemoryStore::from_systems(vec![
            System::new(1, "A", Point3::new(5.0, 5.0, 5.0)),
            System::new(2, "B", Point3::new(6.0, 5.0, 5.0)),
        ]);
        let region = BoundingBox::new(Point3::ORIGIN, Point3::new(39.0, 19.0, 19.0));
        let target = Point3::new(100.0, 0.0, 0.0);
        let lattice = aggregate_grid(&store, &region, 20.0, target).expect("lattice");

        assert_eq!(lattice.len(), 2);
        assert_eq!(lattice.total_count(), 2);
        let empty = lattice.cubes[1];
        assert_eq!(empty.count, 0);
        assert_eq!(empty.center, Point3::new(30.0, 10.0, 10.0));
        assert!((empty.centroid_distance - empty.center.distance(target)).abs() < 1e-9);
        assert!((empty.weight - 3f64.ln() * empty.centroid_distance).abs() < 1e-9);
    }

    #[test]
    fn empty_region_is_not_an_error() {
        let store = InMemoryStore::from_systems(Vec::new());
        let region = BoundingBox::new(Point3::ORIGIN, Point3::new(100.0, 100.0, 100.0));
        let lattice = aggregate_grid(&store, &region, 25.0, Point3::ORIGIN).expect("lattice");
        assert_eq!(lattice.len(), 125);
        assert_eq!(lattice.total_count(), 0);
    }

    #[test]
    fn store_failure_is_data_unavailable() {
        let region = BoundingBox::new(Point3::ORIGIN, Point3::new(10.0, 10.0, 10.0));
        let err = aggregate_grid(&FailingStore, &region, 5.0, Point3::ORIGIN).unwrap_err();
        assert!(matches!(err, RouteError::DataUnavailable(_)));
    }
}
