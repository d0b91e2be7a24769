use std::path::Path;
use std::sync::Mutex;

use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};

use crate::catalog::StarCatalog;
use crate::error::StoreError;
use crate::geometry::Point3;
use crate::store::{
    bucket_positions, Locator, NearbySystem, PointStore, RegionCell, SystemRef,
    DEFAULT_RESOLVE_RADIUS,
};
use crate::System;

/// Point store over a SQLite database holding a
/// `systems(id INTEGER, name TEXT, x REAL, y REAL, z REAL)` table.
///
/// Box filtering happens in SQL; distances and cube bucketing are computed
/// here so the database needs no math extensions.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    resolve_radius: f64,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        info!("Opened SQLite point store at {}", path.as_ref().display());
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        SqliteStore {
            conn: Mutex::new(conn),
            resolve_radius: DEFAULT_RESOLVE_RADIUS,
        }
    }

    pub fn with_resolve_radius(mut self, radius: f64) -> Self {
        self.resolve_radius = radius;
        self
    }

    /// Reads the whole table into an in-memory catalog.
    pub fn load_catalog(&self) -> Result<StarCatalog, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt = conn.prepare("SELECT id, name, x, y, z FROM systems ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            Ok(System {
                id: id as u32,
                name: row.get(1)?,
                pos: Point3::new(row.get(2)?, row.get(3)?, row.get(4)?),
            })
        })?;
        let systems = rows.collect::<Result<Vec<_>, _>>()?;
        debug!("Loaded {} systems from SQLite", systems.len());
        Ok(StarCatalog::new(systems))
    }

    fn positions_in_box(
        &self,
        min: Point3,
        max: Point3,
    ) -> Result<Vec<(String, Point3)>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt = conn.prepare_cached(
            "SELECT name, x, y, z FROM systems
             WHERE x >= ?1 AND x <= ?2 AND y >= ?3 AND y <= ?4 AND z >= ?5 AND z <= ?6",
        )?;
        let rows = stmt.query_map(
            params![min.x, max.x, min.y, max.y, min.z, max.z],
            |row| {
                let name: String = row.get(0)?;
                Ok((name, Point3::new(row.get(1)?, row.get(2)?, row.get(3)?)))
            },
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl PointStore for SqliteStore {
    fn resolve_point(&self, locator: &Locator) -> Result<SystemRef, StoreError> {
        match locator {
            Locator::Name(name) => {
                let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
                let found = conn
                    .query_row(
                        "SELECT name, x, y, z FROM systems WHERE name = ?1",
                        params![name],
                        |row| {
                            Ok(SystemRef {
                                name: row.get(0)?,
                                position: Point3::new(row.get(1)?, row.get(2)?, row.get(3)?),
                            })
                        },
                    )
                    .optional()?;
                found.ok_or_else(|| StoreError::NotFound(locator.to_string()))
            }
            Locator::Coordinates(p) => self
                .nearest_points(*p, self.resolve_radius, 1)?
                .into_iter()
                .next()
                .map(|nearby| nearby.system)
                .ok_or_else(|| StoreError::NotFound(locator.to_string())),
        }
    }

    fn aggregate_region(
        &self,
        min: Point3,
        max: Point3,
        cube_side: f64,
        target: Point3,
    ) -> Result<Vec<RegionCell>, StoreError> {
        let positions = self.positions_in_box(min, max)?;
        Ok(bucket_positions(
            positions.into_iter().map(|(_, p)| p),
            cube_side,
            target,
        ))
    }

    fn nearest_points(
        &self,
        center: Point3,
        radius: f64,
        limit: usize,
    ) -> Result<Vec<NearbySystem>, StoreError> {
        let reach = Point3::new(radius, radius, radius);
        let mut found: Vec<NearbySystem> = self
            .positions_in_box(center - reach, center + reach)?
            .into_iter()
            .filter_map(|(name, position)| {
                let distance = position.distance(center);
                (distance <= radius).then(|| NearbySystem {
                    system: SystemRef { name, position },
                    distance,
                })
            })
            .collect();
        found.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.system.name.cmp(&b.system.name))
        });
        found.truncate(limit);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> SqliteStore {
        let conn = Connection::open_in_memory().expect("sqlite");
        conn.execute_batch(
            "CREATE TABLE systems (id INTEGER PRIMARY KEY, name TEXT, x REAL, y REAL, z REAL);
             INSERT INTO systems VALUES (1, 'Sol', 0, 0, 0);
             INSERT INTO systems VALUES (2, 'Lalande 21185', -3.44, 7.54, -6.31);
             INSERT INTO systems VALUES (3, 'Remote', 900, 0, 0);",
        )
        .expect("schema");
        SqliteStore::from_connection(conn)
    }

    #[test]
    fn nearest_orders_by_distance() {
        let store = fixture();
        let found = store
            .nearest_points(Point3::new(-1.0, 2.0, -2.0), 50.0, 5)
            .expect("query");
        let names: Vec<&str> = found.iter().map(|n| n.system.name.as_str()).collect();
        assert_eq!(names, vec!["Sol", "Lalande 21185"]);
    }

    #[test]
    fn resolve_and_load_catalog() {
        let store = fixture();
        let remote = store.resolve_point(&"Remote".into()).expect("resolve");
        assert_eq!(remote.position, Point3::new(900.0, 0.0, 0.0));
        assert!(matches!(
            store.resolve_point(&"Nowhere".into()),
            Err(StoreError::NotFound(_))
        ));

        let catalog = store.load_catalog().expect("catalog");
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.index_of_name("Sol"), Some(0));
    }

    #[test]
    fn aggregate_counts_cells() {
        let store = fixture();
        let cells = store
            .aggregate_region(
                Point3::new(-20.0, -20.0, -20.0),
                Point3::new(20.0, 20.0, 20.0),
                40.0,
                Point3::ORIGIN,
            )
            .expect("aggregate");
        assert_eq!(cells.len(), 2);
        assert_eq!(cells.iter().map(|c| c.count).sum::<u32>(), 2);
    }
}
