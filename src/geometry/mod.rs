pub mod line;
pub mod point;

pub use line::{distance_point_to_line, fit_line, project_point_on_line, Line};
pub use point::Point3;
