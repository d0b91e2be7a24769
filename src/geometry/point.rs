use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// A position (or free vector) in galactic coordinates.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const ORIGIN: Point3 = Point3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Point3 { x, y, z }
    }

    pub fn from_array(p: [f64; 3]) -> Self {
        Point3::new(p[0], p[1], p[2])
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn dot(self, other: Point3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Point3) -> Point3 {
        Point3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, other: Point3) -> f64 {
        (self - other).norm()
    }

    /// Unit vector in the same direction, or `None` for a zero-length vector.
    pub fn normalized(self) -> Option<Point3> {
        let n = self.norm();
        if n > f64::EPSILON {
            Some(self * (1.0 / n))
        } else {
            None
        }
    }

    /// Center of the grid cube of edge `side` that contains this point.
    pub fn cube_center(self, side: f64) -> Point3 {
        let snap = |v: f64| side * (v / side).floor() + side / 2.0;
        Point3::new(snap(self.x), snap(self.y), snap(self.z))
    }

    /// Minimum corner of the grid cube of edge `side` that contains this point.
    pub fn cube_corner(self, side: f64) -> Point3 {
        let snap = |v: f64| side * (v / side).floor();
        Point3::new(snap(self.x), snap(self.y), snap(self.z))
    }

    /// Integer grid index of the cube of edge `side` containing this point.
    pub fn cube_index(self, side: f64) -> [i64; 3] {
        [
            (self.x / side).floor() as i64,
            (self.y / side).floor() as i64,
            (self.z / side).floor() as i64,
        ]
    }

    pub fn min(self, other: Point3) -> Point3 {
        Point3::new(
            self.x.min(other.x),
            self.y.min(other.y),
            self.z.min(other.z),
        )
    }

    pub fn max(self, other: Point3) -> Point3 {
        Point3::new(
            self.x.max(other.x),
            self.y.max(other.y),
            self.z.max(other.z),
        )
    }
}

impl Add for Point3 {
    type Output = Point3;

    fn add(self, rhs: Point3) -> Point3 {
        Point3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Point3 {
    type Output = Point3;

    fn sub(self, rhs: Point3) -> Point3 {
        Point3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Point3 {
    type Output = Point3;

    fn mul(self, rhs: f64) -> Point3 {
        Point3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::Point3;

    #[test]
    fn cube_center_snaps_negative_coordinates_down() {
        let p = Point3::new(-1.0, 39.9, 40.0);
        assert_eq!(p.cube_center(40.0), Point3::new(-20.0, 20.0, 60.0));
        assert_eq!(p.cube_index(40.0), [-1, 0, 1]);
    }

    #[test]
    fn zero_vector_has_no_direction() {
        assert!(Point3::ORIGIN.normalized().is_none());
        let unit = Point3::new(0.0, 3.0, 4.0).normalized().expect("unit");
        assert!((unit.norm() - 1.0).abs() < 1e-12);
    }
}
