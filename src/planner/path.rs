//! Adaptive grid search producing an ordered list of waypoints.
//!
//! The planner alternates between two phases. `Searching` fixes the grid
//! resolution for a pass; `Advancing` repeatedly scans an enclosure ahead of
//! the current waypoint, ranks its cubes and resolves the best ones to real
//! systems. When a pass stops making progress the grid shrinks and the next
//! pass starts. Sparse data never aborts the search; it only limits how far
//! the route gets.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};

use crate::error::RouteError;
use crate::geometry::Point3;
use crate::planner::config::{ConfigError, PlannerConfig};
use crate::planner::grid::{aggregate_grid, BoundingBox};
use crate::planner::resolver::{resolve_waypoint, ResolverSettings};
use crate::planner::scoring::{rank_candidates, ScoredCube};
use crate::store::{Locator, NearbySystem, PointStore, SystemRef};

/// Lateral half-width of the enclosure, in cubes, along y.
const ENCLOSURE_VERTICAL: f64 = 16.0;
/// Half-width along the horizontal axis that does not dominate travel.
const ENCLOSURE_LATERAL: f64 = 8.0;
/// Padding along the dominant travel axis.
const ENCLOSURE_TUBE: f64 = 1.0;

/// One accepted stop on the route.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub system: String,
    pub position: Point3,
    pub hop_distance: f64,
    pub remaining_distance: f64,
    pub weight: f64,
    pub density: f64,
    pub snap_error: f64,
}

/// Route under construction. Waypoints are only ever appended and the grid
/// edge only ever shrinks; the start waypoint is always present.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathState {
    start: Point3,
    target: Point3,
    waypoints: Vec<Waypoint>,
    cube_side: f64,
    search_side: f64,
}

impl PathState {
    fn new(start: &SystemRef, target: Point3, cube_side: f64, search_side: f64) -> Self {
        PathState {
            start: start.position,
            target,
            waypoints: vec![Waypoint {
                system: start.name.clone(),
                position: start.position,
                hop_distance: 0.0,
                remaining_distance: start.position.distance(target),
                weight: 0.0,
                density: 0.0,
                snap_error: 0.0,
            }],
            cube_side,
            search_side,
        }
    }

    pub fn start(&self) -> Point3 {
        self.start
    }

    pub fn target(&self) -> Point3 {
        self.target
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn cube_side(&self) -> f64 {
        self.cube_side
    }

    pub fn search_side(&self) -> f64 {
        self.search_side
    }

    pub fn last(&self) -> &Waypoint {
        // never empty: constructed with the start waypoint
        &self.waypoints[self.waypoints.len() - 1]
    }

    pub fn remaining_distance(&self) -> f64 {
        self.last().remaining_distance
    }

    pub fn contains(&self, system: &str) -> bool {
        self.waypoints.iter().any(|w| w.system == system)
    }

    fn push(&mut self, waypoint: Waypoint) {
        self.waypoints.push(waypoint);
    }

    fn shrink_to(&mut self, cube_side: f64) {
        self.cube_side = self.cube_side.min(cube_side);
    }
}

/// Why an `Advancing` pass stopped without accepting a waypoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StallKind {
    /// The region aggregate failed or the enclosure held no systems.
    DataUnavailable,
    /// No ranked cube resolved to an acceptable system.
    NoCandidateFound,
    /// Systems resolved, but none brought the route closer to the target.
    NoProgress,
    /// The pass hit `max_iterations_per_resolution`.
    IterationCap,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stall {
    pub kind: StallKind,
    pub cube_side: f64,
    pub detail: String,
}

/// Record of the hop leaving a waypoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HopRecord {
    pub target_system: String,
    pub hop_distance: f64,
    pub remaining_distance: f64,
    pub weight: f64,
    pub density: f64,
    pub cube: Point3,
    pub snap_error: f64,
}

/// Everything the planner observed while standing at one waypoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HopDiagnostics {
    pub candidates: Vec<NearbySystem>,
    pub stalls: Vec<Stall>,
    pub next_waypoint: Option<HopRecord>,
}

/// Planner output: the final path state plus per-waypoint diagnostics keyed
/// by the identifier of the waypoint the hop left from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlannedRoute {
    pub state: PathState,
    pub diagnostics: BTreeMap<String, HopDiagnostics>,
}

impl PlannedRoute {
    pub fn waypoints(&self) -> &[Waypoint] {
        self.state.waypoints()
    }

    pub fn remaining_distance(&self) -> f64 {
        self.state.remaining_distance()
    }

    /// Whether the last waypoint lies within `tolerance` of the target.
    pub fn arrived(&self, tolerance: f64) -> bool {
        self.remaining_distance() <= tolerance
    }

    /// Jump count estimate for a ship with the given range: every hop costs
    /// one jump plus one per full `jump_range` it spans. `None` unless the
    /// range is finite and positive.
    pub fn estimated_jumps(&self, jump_range: f64) -> Option<usize> {
        if !(jump_range.is_finite() && jump_range > 0.0) {
            return None;
        }
        self.waypoints()
            .iter()
            .skip(1)
            .try_fold(0usize, |total, w| {
                let spans = (w.hop_distance / jump_range).floor();
                if !spans.is_finite() || spans >= usize::MAX as f64 {
                    return None;
                }
                total.checked_add(1)?.checked_add(spans as usize)
            })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Searching,
    Advancing,
    Done,
}

enum StepOutcome {
    Advanced { previous_snap: Point3 },
    Stalled(StallKind, String),
}

/// Waypoint planner over a [`PointStore`].
pub struct PathPlanner<S> {
    store: S,
    config: PlannerConfig,
}

impl<S: PointStore> PathPlanner<S> {
    pub fn new(store: S, config: PlannerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(PathPlanner { store, config })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolves both ends through the store and plans between them.
    ///
    /// Only an unresolvable start or target (or a failing store during that
    /// resolution) is an error.
    pub fn plan(&self, start: &Locator, target: &Locator) -> Result<PlannedRoute, RouteError> {
        let start = self.store.resolve_point(start)?;
        let target = self.store.resolve_point(target)?;
        Ok(self.plan_between(&start, &target))
    }

    pub fn plan_between(&self, start: &SystemRef, target: &SystemRef) -> PlannedRoute {
        self.plan_between_cancellable(start, target, &AtomicBool::new(false))
    }

    /// Like [`plan_between`](Self::plan_between) but checks `cancel` before
    /// every advancing step and returns the route built so far once it is set.
    pub fn plan_between_cancellable(
        &self,
        start: &SystemRef,
        target: &SystemRef,
        cancel: &AtomicBool,
    ) -> PlannedRoute {
        let mut state = PathState::new(
            start,
            target.position,
            self.config.initial_cube_side,
            self.config.search_side,
        );
        let mut diagnostics = BTreeMap::new();

        if start.position.distance(target.position) == 0.0 {
            debug!("{} is its own destination", start.name);
            return PlannedRoute { state, diagnostics };
        }

        info!(
            "{} -> {}: {:.1} ly",
            start.name,
            target.name,
            state.remaining_distance()
        );

        let mut phase = Phase::Searching;
        let mut last_cube = state.cube_side;
        while phase != Phase::Done {
            phase = match phase {
                Phase::Searching => {
                    if state.cube_side <= self.config.minimum_cube_side {
                        Phase::Done
                    } else {
                        let cube = (2.0 * (state.cube_side / 2.0).floor())
                            .max(self.config.minimum_cube_side);
                        state.shrink_to(cube);
                        state.search_side = state.search_side.max(9.0 * cube);
                        last_cube = cube;
                        info!(
                            "searching with {cube} ly cubes over {} ly",
                            state.search_side
                        );
                        Phase::Advancing
                    }
                }
                Phase::Advancing => {
                    if self.advance(&mut state, &mut diagnostics, cancel) {
                        warn!("route planning cancelled at {}", state.last().system);
                        Phase::Done
                    } else {
                        let shrunk = (state.cube_side * self.config.shrink_factor).floor();
                        state.shrink_to(shrunk);
                        Phase::Searching
                    }
                }
                Phase::Done => Phase::Done,
            };
        }

        if !cancel.load(Ordering::Relaxed) {
            self.finish(&mut state, target, last_cube);
        }

        info!(
            "route has {} waypoints, {:.1} ly remaining",
            state.waypoints.len(),
            state.remaining_distance()
        );
        PlannedRoute { state, diagnostics }
    }

    /// Runs `Advancing` at the current resolution. Returns `true` when cancelled.
    fn advance(
        &self,
        state: &mut PathState,
        diagnostics: &mut BTreeMap<String, HopDiagnostics>,
        cancel: &AtomicBool,
    ) -> bool {
        let cube = state.cube_side;
        let mut arrival = self.config.arrival_factor * cube;
        if let Some(hop) = self.config.max_hop {
            arrival = arrival.min(hop);
        }

        for iteration in 0.. {
            if cancel.load(Ordering::Relaxed) {
                return true;
            }
            if state.remaining_distance() <= arrival {
                break;
            }
            if iteration >= self.config.max_iterations_per_resolution {
                record_stall(
                    diagnostics,
                    state,
                    StallKind::IterationCap,
                    format!("{iteration} steps at {cube} ly"),
                );
                break;
            }

            match self.step(state, diagnostics) {
                StepOutcome::Advanced { previous_snap } => {
                    let snapped = state.last().position.cube_center(cube);
                    if snapped.distance(previous_snap) < cube {
                        debug!("progress below one cube at {cube} ly, refining grid");
                        break;
                    }
                }
                StepOutcome::Stalled(kind, detail) => {
                    debug!("stalled at {} ({kind:?}): {detail}", state.last().system);
                    record_stall(diagnostics, state, kind, detail);
                    break;
                }
            }
        }
        false
    }

    /// One scan-rank-resolve cycle from the last waypoint.
    fn step(
        &self,
        state: &mut PathState,
        diagnostics: &mut BTreeMap<String, HopDiagnostics>,
    ) -> StepOutcome {
        let cube = state.cube_side;
        let search = state.search_side;
        let last = state.last().clone();
        let current = last.position.cube_center(cube);

        let to_target = state.target - current;
        let travel = to_target.norm();
        let Some(direction) = to_target.normalized() else {
            return StepOutcome::Stalled(
                StallKind::NoProgress,
                "target lies at the current cube center".into(),
            );
        };

        let steps = (0.9 * search / cube).floor();
        let step_len = if state.waypoints.len() > 2 && travel > 2.0 * search {
            cube
        } else {
            cube / 2.0
        };
        let mut offset = (steps * step_len).min(travel);
        if let Some(hop) = self.config.max_hop {
            offset = offset.min(hop);
        }
        let provisional = current + direction * offset;
        let next_cube = provisional.cube_center(cube);
        let target = state.target;

        let region = enclosure(current, next_cube, direction, cube);
        trace!(
            "scanning {:?}..{:?} towards {:?}",
            region.min,
            region.max,
            next_cube
        );
        let mut lattice = match aggregate_grid(&self.store, &region, cube, target) {
            Ok(lattice) => lattice,
            Err(err) => return StepOutcome::Stalled(StallKind::DataUnavailable, err.to_string()),
        };
        if lattice.total_count() == 0 {
            return StepOutcome::Stalled(
                StallKind::DataUnavailable,
                format!("no systems in {} cubes", lattice.len()),
            );
        }

        let ranked = rank_candidates(
            &mut lattice,
            current,
            direction,
            target,
            self.config.shell_percentile,
            self.config.candidate_percentile,
            self.config.parallel_scoring,
        );
        if ranked.is_empty() {
            return StepOutcome::Stalled(StallKind::NoCandidateFound, "no candidate cubes".into());
        }

        let settings = ResolverSettings::for_cube(cube, &self.config);
        let progress = self.config.progress_factor * cube;
        let max_hop = self.config.max_hop;
        let entry = diagnostics.entry(last.system.clone()).or_default();

        let accept = |n: &NearbySystem| {
            !state.contains(&n.system.name)
                && max_hop.map_or(true, |hop| n.system.position.distance(last.position) <= hop)
        };

        let mut resolved_any = false;
        let mut accepted: Option<(NearbySystem, ScoredCube)> = None;
        for candidate in &ranked {
            let hit = match resolve_waypoint(&self.store, candidate.cube.center, &settings, accept) {
                Ok(hit) => hit,
                Err(err) => {
                    trace!("cube {:?}: {err}", candidate.cube.center);
                    continue;
                }
            };
            resolved_any = true;
            entry.candidates.push(hit.clone());

            let remaining = hit.system.position.distance(state.target);
            if last.remaining_distance - remaining <= progress {
                trace!(
                    "{} is not closer than {} by more than {progress} ly",
                    hit.system.name,
                    last.system
                );
                continue;
            }
            accepted = Some((hit, *candidate));
            break;
        }

        let Some((hit, candidate)) = accepted else {
            let kind = if resolved_any {
                StallKind::NoProgress
            } else {
                StallKind::NoCandidateFound
            };
            return StepOutcome::Stalled(kind, format!("{} ranked cubes exhausted", ranked.len()));
        };

        let position = hit.system.position;
        let waypoint = Waypoint {
            system: hit.system.name.clone(),
            position,
            hop_distance: position.distance(last.position),
            remaining_distance: position.distance(state.target),
            weight: candidate.weight,
            density: 1000.0 * candidate.density / cube.powi(3),
            snap_error: position.distance(next_cube),
        };
        info!(
            "{:26} {:7.1} ly -> {:26} {:6.2}\t{:7.1} ly remaining",
            last.system,
            waypoint.hop_distance,
            waypoint.system,
            waypoint.weight,
            waypoint.remaining_distance
        );
        entry.next_waypoint = Some(HopRecord {
            target_system: waypoint.system.clone(),
            hop_distance: waypoint.hop_distance,
            remaining_distance: waypoint.remaining_distance,
            weight: waypoint.weight,
            density: waypoint.density,
            cube: candidate.cube.center,
            snap_error: waypoint.snap_error,
        });
        state.push(waypoint);

        StepOutcome::Advanced {
            previous_snap: current,
        }
    }

    /// Appends the target itself when it is within one final hop.
    fn finish(&self, state: &mut PathState, target: &SystemRef, last_cube: f64) {
        if !self.config.append_target || state.contains(&target.name) {
            return;
        }
        let reach = self
            .config
            .max_hop
            .unwrap_or(self.config.arrival_factor * last_cube);
        let last = state.last();
        let hop = last.position.distance(target.position);
        if hop > reach {
            debug!(
                "{} stays {hop:.1} ly short of {} (reach {reach:.1} ly)",
                last.system, target.name
            );
            return;
        }
        state.push(Waypoint {
            system: target.name.clone(),
            position: target.position,
            hop_distance: hop,
            remaining_distance: 0.0,
            weight: 0.0,
            density: 0.0,
            snap_error: 0.0,
        });
    }
}

fn record_stall(
    diagnostics: &mut BTreeMap<String, HopDiagnostics>,
    state: &PathState,
    kind: StallKind,
    detail: String,
) {
    diagnostics
        .entry(state.last().system.clone())
        .or_default()
        .stalls
        .push(Stall {
            kind,
            cube_side: state.cube_side,
            detail,
        });
}

/// Region scanned for one step: a thin tube along whichever of x or z
/// dominates the travel direction, wide along y and the other horizontal axis.
/// The upper bound reaches 1 ly into the last cube layer.
fn enclosure(current: Point3, next: Point3, direction: Point3, cube: f64) -> BoundingBox {
    let a = current.cube_corner(cube);
    let b = next.cube_corner(cube);
    let (pad_x, pad_z) = if direction.x * direction.x > direction.z * direction.z {
        (ENCLOSURE_TUBE, ENCLOSURE_LATERAL)
    } else {
        (ENCLOSURE_LATERAL, ENCLOSURE_TUBE)
    };
    let pad = Point3::new(pad_x * cube, ENCLOSURE_VERTICAL * cube, pad_z * cube);
    BoundingBox {
        min: a.min(b) - pad,
        max: a.max(b) + pad + Point3::new(1.0, 1.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enclosure_follows_dominant_axis() {
        let along_x = enclosure(
            Point3::new(20.0, 20.0, 20.0),
            Point3::new(100.0, 20.0, 20.0),
            Point3::new(1.0, 0.0, 0.2),
            40.0,
        );
        assert_eq!(along_x.min, Point3::new(-40.0, -640.0, -320.0));
        assert_eq!(along_x.max, Point3::new(121.0, 641.0, 321.0));
        assert_eq!(along_x.lattice_len(40.0), 5 * 33 * 17);

        let along_z = enclosure(
            Point3::new(20.0, 20.0, 20.0),
            Point3::new(20.0, 20.0, 100.0),
            Point3::new(0.1, 0.0, -1.0),
            40.0,
        );
        assert_eq!(along_z.min.x, -320.0);
        assert_eq!(along_z.min.z, -40.0);
    }

    #[test]
    fn jump_estimate_counts_partial_ranges() {
        let start = SystemRef {
            name: "A".into(),
            position: Point3::ORIGIN,
        };
        let mut state = PathState::new(&start, Point3::new(70.0, 0.0, 0.0), 40.0, 1200.0);
        for (name, x) in [("B", 30.0), ("C", 70.0)] {
            state.push(Waypoint {
                system: name.into(),
                position: Point3::new(x, 0.0, 0.0),
                hop_distance: if name == "B" { 30.0 } else { 40.0 },
                remaining_distance: 70.0 - x,
                weight: 0.0,
                density: 0.0,
                snap_error: 0.0,
            });
        }
        let route = PlannedRoute {
            state,
            diagnostics: BTreeMap::new(),
        };
        // 30 ly → 1 + 1, 40 ly → 1 + 1
        assert_eq!(route.estimated_jumps(25.0), Some(4));
        assert!(route.arrived(0.0));

        for range in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            assert_eq!(route.estimated_jumps(range), None, "range {range}");
        }
    }
}
