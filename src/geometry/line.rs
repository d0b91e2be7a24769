use nalgebra::DMatrix;

use crate::error::RouteError;
use crate::geometry::Point3;

/// Principal singular values below this are treated as a point cloud with no
/// usable direction.
const MIN_SINGULAR_VALUE: f64 = 1e-9;

/// An infinite line through `support` along the unit vector `direction`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Line {
    pub direction: Point3,
    pub support: Point3,
}

impl Line {
    pub fn distance_to(&self, point: Point3) -> f64 {
        distance_point_to_line(point, self.direction, self.support)
    }

    pub fn project(&self, point: Point3) -> Point3 {
        project_point_on_line(point, self.direction, self.support)
    }

    /// Signed distance of the projection of `point` from the support point.
    pub fn along(&self, point: Point3) -> f64 {
        (point - self.support).dot(self.direction)
    }
}

/// Least-squares line through `points`.
///
/// The support is the centroid and the direction is the first right singular
/// vector of the mean-centered point matrix.
pub fn fit_line(points: &[Point3]) -> Result<Line, RouteError> {
    if points.len() < 2 {
        return Err(RouteError::DegenerateGeometry(format!(
            "need at least 2 points to fit a line, got {}",
            points.len()
        )));
    }

    let n = points.len() as f64;
    let sum = points.iter().fold(Point3::ORIGIN, |acc, &p| acc + p);
    let support = sum * (1.0 / n);

    let centered = DMatrix::from_row_iterator(
        points.len(),
        3,
        points.iter().flat_map(|&p| (p - support).to_array()),
    );
    let svd = centered.svd(false, true);
    let v_t = svd.v_t.as_ref().ok_or_else(|| {
        RouteError::DegenerateGeometry("singular value decomposition did not converge".into())
    })?;

    let (principal, sigma) = svd
        .singular_values
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .ok_or_else(|| RouteError::DegenerateGeometry("empty decomposition".into()))?;
    if sigma < MIN_SINGULAR_VALUE {
        return Err(RouteError::DegenerateGeometry(
            "points coincide, no principal direction".into(),
        ));
    }

    let row = v_t.row(principal);
    let direction = Point3::new(row[0], row[1], row[2])
        .normalized()
        .ok_or_else(|| RouteError::DegenerateGeometry("zero principal axis".into()))?;

    Ok(Line { direction, support })
}

/// Perpendicular distance from `point` to the line through `support` along
/// `direction`. The direction need not be normalized.
pub fn distance_point_to_line(point: Point3, direction: Point3, support: Point3) -> f64 {
    direction.cross(point - support).norm() / direction.norm()
}

/// Orthogonal projection of `point` onto the line through `support` along
/// `direction`. The result does not depend on the length of `direction`;
/// a zero direction projects everything onto `support`.
pub fn project_point_on_line(point: Point3, direction: Point3, support: Point3) -> Point3 {
    match direction.normalized() {
        Some(unit) => support + unit * (point - support).dot(unit),
        None => support,
    }
}
