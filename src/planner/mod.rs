pub mod config;
pub mod corridor;
pub mod grid;
pub mod path;
pub mod resolver;
pub mod scoring;

pub use config::{ConfigError, PlannerConfig};
pub use corridor::RouteCorridor;
pub use grid::{aggregate_grid, BoundingBox, Cube, Lattice};
pub use path::{
    HopDiagnostics, HopRecord, PathPlanner, PathState, PlannedRoute, Stall, StallKind, Waypoint,
};
pub use resolver::{resolve_waypoint, ResolverSettings};
pub use scoring::{proximity_shell, rank_candidates, score_shell, select_lowest, ScoredCube};
