use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::geometry::Point3;
use crate::spatial::KDTree;
use crate::System;

/// In-memory star catalog with name and spatial indices.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StarCatalog {
    pub systems: Vec<System>,
    #[serde(skip)]
    name_index: HashMap<String, usize>,
    #[serde(skip)]
    tree: KDTree,
}

impl StarCatalog {
    pub fn new(systems: Vec<System>) -> Self {
        let mut catalog = StarCatalog {
            systems,
            name_index: HashMap::new(),
            tree: KDTree::default(),
        };
        catalog.rebuild_indices();
        catalog
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    pub fn index_of_id(&self, id: u32) -> Option<usize> {
        self.systems.iter().position(|s| s.id == id)
    }

    pub fn index_of_name(&self, name: &str) -> Option<usize> {
        self.name_index.get(name).copied()
    }

    pub fn get(&self, index: usize) -> Option<&System> {
        self.systems.get(index)
    }

    /// Up to `limit` systems within `radius` of `center`, nearest first.
    pub fn nearest(&self, center: Point3, radius: f64, limit: usize) -> Vec<(&System, f64)> {
        self.tree
            .nearest_n_within_radius(center, radius, limit)
            .into_iter()
            .map(|(idx, d)| (&self.systems[idx], d))
            .collect()
    }

    /// Systems inside the box, bounds inclusive.
    pub fn within_box(&self, min: Point3, max: Point3) -> impl Iterator<Item = &System> {
        self.tree
            .within_box(min, max)
            .into_iter()
            .map(move |idx| &self.systems[idx])
    }

    pub fn rebuild_indices(&mut self) {
        self.name_index = self
            .systems
            .iter()
            .enumerate()
            .map(|(idx, system)| (system.name.clone(), idx))
            .collect();
        let points: Vec<Point3> = self.systems.iter().map(|s| s.pos).collect();
        self.tree = KDTree::build(&points);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_by_name_id_and_radius() {
        let catalog = StarCatalog::new(vec![
            System::new(7, "Sol", Point3::new(0.0, 0.0, 0.0)),
            System::new(9, "Alpha Centauri", Point3::new(3.03, -0.09, 3.16)),
            System::new(11, "Sirius", Point3::new(6.25, -1.28, -5.75)),
        ]);

        assert_eq!(catalog.index_of_name("Sirius"), Some(2));
        assert_eq!(catalog.index_of_id(9), Some(1));
        assert!(catalog.index_of_name("Vega").is_none());

        let near: Vec<&str> = catalog
            .nearest(Point3::ORIGIN, 5.0, 5)
            .into_iter()
            .map(|(s, _)| s.name.as_str())
            .collect();
        assert_eq!(near, vec!["Sol", "Alpha Centauri"]);
    }
}
