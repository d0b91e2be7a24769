use std::sync::Arc;

use log::trace;

use crate::catalog::StarCatalog;
use crate::error::StoreError;
use crate::geometry::Point3;
use crate::store::{
    bucket_positions, Locator, NearbySystem, PointStore, RegionCell, SystemRef,
    DEFAULT_RESOLVE_RADIUS,
};
use crate::System;

/// Point store backed by an in-memory [`StarCatalog`].
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    catalog: Arc<StarCatalog>,
    resolve_radius: f64,
}

impl InMemoryStore {
    pub fn new(catalog: impl Into<Arc<StarCatalog>>) -> Self {
        InMemoryStore {
            catalog: catalog.into(),
            resolve_radius: DEFAULT_RESOLVE_RADIUS,
        }
    }

    pub fn from_systems(systems: Vec<System>) -> Self {
        Self::new(StarCatalog::new(systems))
    }

    pub fn with_resolve_radius(mut self, radius: f64) -> Self {
        self.resolve_radius = radius;
        self
    }

    pub fn catalog(&self) -> &StarCatalog {
        &self.catalog
    }
}

fn system_ref(system: &System) -> SystemRef {
    SystemRef {
        name: system.name.clone(),
        position: system.pos,
    }
}

impl PointStore for InMemoryStore {
    fn resolve_point(&self, locator: &Locator) -> Result<SystemRef, StoreError> {
        let found = match locator {
            Locator::Name(name) => self
                .catalog
                .index_of_name(name)
                .and_then(|idx| self.catalog.get(idx)),
            Locator::Coordinates(p) => self
                .catalog
                .nearest(*p, self.resolve_radius, 1)
                .into_iter()
                .next()
                .map(|(system, _)| system),
        };
        found
            .map(system_ref)
            .ok_or_else(|| StoreError::NotFound(locator.to_string()))
    }

    fn aggregate_region(
        &self,
        min: Point3,
        max: Point3,
        cube_side: f64,
        target: Point3,
    ) -> Result<Vec<RegionCell>, StoreError> {
        let cells = bucket_positions(
            self.catalog.within_box(min, max).map(|s| s.pos),
            cube_side,
            target,
        );
        trace!("aggregate {:?}..{:?} @ {cube_side}: {} cells", min, max, cells.len());
        Ok(cells)
    }

    fn nearest_points(
        &self,
        center: Point3,
        radius: f64,
        limit: usize,
    ) -> Result<Vec<NearbySystem>, StoreError> {
        Ok(self
            .catalog
            .nearest(center, radius, limit)
            .into_iter()
            .map(|(system, distance)| NearbySystem {
                system: system_ref(system),
                distance,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryStore {
        InMemoryStore::from_systems(vec![
            System::new(1, "Sol", Point3::ORIGIN),
            System::new(2, "Wolf 359", Point3::new(3.87, 6.95, -1.34)),
            System::new(3, "Far", Point3::new(500.0, 0.0, 0.0)),
        ])
    }

    #[test]
    fn resolves_names_and_coordinates() {
        let store = store();
        let by_name = store.resolve_point(&"Wolf 359".into()).expect("name");
        assert_eq!(by_name.position, Point3::new(3.87, 6.95, -1.34));

        let by_pos = store
            .resolve_point(&Point3::new(490.0, 5.0, 0.0).into())
            .expect("coordinates");
        assert_eq!(by_pos.name, "Far");

        let missing = store.resolve_point(&Point3::new(250.0, 0.0, 0.0).into());
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn aggregate_only_counts_inside_box() {
        let store = store();
        let cells = store
            .aggregate_region(
                Point3::new(-10.0, -10.0, -10.0),
                Point3::new(10.0, 10.0, 10.0),
                20.0,
                Point3::ORIGIN,
            )
            .expect("aggregate");
        let total: u32 = cells.iter().map(|c| c.count).sum();
        assert_eq!(total, 2);
    }
}
