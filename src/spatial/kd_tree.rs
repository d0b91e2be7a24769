use serde::{Deserialize, Serialize};

use crate::geometry::Point3;

/// Node in a 3D k-d tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KDNode {
    pub point: Point3,
    pub index: usize,
    pub axis: usize,
    pub left: Option<Box<KDNode>>,
    pub right: Option<Box<KDNode>>,
}

/// 3D k-d tree answering N-nearest-within-radius and box queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KDTree {
    pub root: Option<Box<KDNode>>,
}

fn coord(p: Point3, axis: usize) -> f64 {
    match axis {
        0 => p.x,
        1 => p.y,
        _ => p.z,
    }
}

impl KDTree {
    pub fn build(points: &[Point3]) -> Self {
        let mut indices: Vec<usize> = (0..points.len()).collect();
        let root = Self::build_recursive(points, &mut indices, 0);
        KDTree { root }
    }

    fn build_recursive(points: &[Point3], idx: &mut [usize], depth: usize) -> Option<Box<KDNode>> {
        if idx.is_empty() {
            return None;
        }

        let axis = depth % 3;
        idx.sort_by(|&a, &b| coord(points[a], axis).total_cmp(&coord(points[b], axis)));
        let mid = idx.len() / 2;
        let median = idx[mid];

        let (lower, upper) = idx.split_at_mut(mid);
        Some(Box::new(KDNode {
            point: points[median],
            index: median,
            axis,
            left: Self::build_recursive(points, lower, depth + 1),
            right: Self::build_recursive(points, &mut upper[1..], depth + 1),
        }))
    }

    /// Returns up to `n` nearest neighbours within the given radius of the target point,
    /// ascending by distance. Equidistant points are ordered by index.
    pub fn nearest_n_within_radius(&self, target: Point3, radius: f64, n: usize) -> Vec<(usize, f64)> {
        let mut results = Vec::new();
        let radius2 = radius * radius;
        Self::search_recursive(&self.root, target, radius2, &mut results);
        results.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        results.truncate(n);
        results
    }

    fn search_recursive(
        node: &Option<Box<KDNode>>,
        target: Point3,
        radius2: f64,
        results: &mut Vec<(usize, f64)>,
    ) {
        if let Some(noderef) = node {
            let d = noderef.point - target;
            let dist2 = d.dot(d);
            if dist2 <= radius2 {
                results.push((noderef.index, dist2.sqrt()));
            }

            let axis = noderef.axis;
            let delta = coord(target, axis) - coord(noderef.point, axis);
            let (first, second) = if delta < 0.0 {
                (&noderef.left, &noderef.right)
            } else {
                (&noderef.right, &noderef.left)
            };

            Self::search_recursive(first, target, radius2, results);
            if delta * delta <= radius2 {
                Self::search_recursive(second, target, radius2, results);
            }
        }
    }

    /// Indices of all points inside the axis-aligned box, bounds inclusive.
    pub fn within_box(&self, min: Point3, max: Point3) -> Vec<usize> {
        let mut results = Vec::new();
        Self::box_recursive(&self.root, min, max, &mut results);
        results.sort_unstable();
        results
    }

    fn box_recursive(node: &Option<Box<KDNode>>, min: Point3, max: Point3, results: &mut Vec<usize>) {
        if let Some(noderef) = node {
            let p = noderef.point;
            if (0..3).all(|a| coord(p, a) >= coord(min, a) && coord(p, a) <= coord(max, a)) {
                results.push(noderef.index);
            }

            let split = coord(p, noderef.axis);
            if coord(min, noderef.axis) <= split {
                Self::box_recursive(&noderef.left, min, max, results);
            }
            if coord(max, noderef.axis) >= split {
                Self::box_recursive(&noderef.right, min, max, results);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::KDTree;
    use crate::geometry::Point3;

    fn sample() -> Vec<Point3> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ]
    }

    #[test]
    fn nearest_n_within_radius_basic() {
        let kd = KDTree::build(&sample());
        let res = kd.nearest_n_within_radius(Point3::ORIGIN, 1.5, 3);
        assert_eq!(res.len(), 2);
        assert_eq!(res[0].0, 0);
        assert_eq!(res[1].0, 1);
    }

    #[test]
    fn box_query_is_inclusive() {
        let kd = KDTree::build(&sample());
        let res = kd.within_box(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 2.0, 0.0));
        assert_eq!(res, vec![0, 1, 3]);
    }
}
