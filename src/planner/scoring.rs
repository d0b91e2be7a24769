//! Candidate ranking over a density lattice.
//!
//! Ranking runs in two percentile stages: a proximity shell of the cubes
//! nearest the target, then the lowest-weight fraction of that shell after
//! each cube is scored by the density along its travel line. Lower weight is
//! better.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::geometry::{distance_point_to_line, Point3};
use crate::planner::grid::{Cube, Lattice};

/// A shell cube together with its travel-line score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredCube {
    pub cube: Cube,
    pub weight: f64,
    /// Mean system count of the cubes in the narrow cylinder.
    pub density: f64,
    pub travel: f64,
}

/// Linear-interpolation percentile (`q` in 0..=100). `None` for no values.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Cubes whose `centroid_distance` lies within the `q`th percentile.
///
/// The cube containing `origin` is dropped since it has no travel line. The
/// result is ordered by descending progress along `direction`; ties in later
/// stages keep this order.
pub fn proximity_shell(cubes: &[Cube], origin: Point3, direction: Point3, q: f64) -> Vec<Cube> {
    let distances: Vec<f64> = cubes.iter().map(|c| c.centroid_distance).collect();
    let Some(threshold) = percentile(&distances, q) else {
        return Vec::new();
    };

    let mut shell: Vec<Cube> = cubes
        .iter()
        .filter(|c| c.centroid_distance <= threshold && c.center.distance(origin) > c.side * 1e-6)
        .copied()
        .collect();
    shell.sort_by(|a, b| {
        let pa = (a.center - origin).dot(direction);
        let pb = (b.center - origin).dot(direction);
        pb.total_cmp(&pa)
    });
    shell
}

/// Scores the travel line from `origin` to `candidate` against the lattice.
pub fn score_cube(lattice: &[Cube], origin: Point3, candidate: &Cube) -> ScoredCube {
    let line = candidate.center - origin;
    let travel = line.norm();
    let narrow_radius = 2.0 * candidate.circumradius();
    let wide_radius = 4.0 * candidate.circumradius();

    let mut narrow_sum = 0.0;
    let mut narrow_count = 0.0;
    let mut narrow_cubes = 0usize;
    let mut wide_count = 0.0;
    let mut wide_cubes = 0usize;
    for cube in lattice {
        let d = distance_point_to_line(cube.center, line, origin);
        if d < wide_radius {
            wide_count += f64::from(cube.count);
            wide_cubes += 1;
        }
        if d < narrow_radius {
            narrow_sum += f64::from(cube.count) / (1.0 + d);
            narrow_count += f64::from(cube.count);
            narrow_cubes += 1;
        }
    }

    let mean = |sum: f64, n: usize| if n > 0 { sum / n as f64 } else { 0.0 };
    let narrow_mean = mean(narrow_count, narrow_cubes);
    let wide_mean = mean(wide_count, wide_cubes);

    ScoredCube {
        cube: *candidate,
        weight: narrow_sum / (1.0 + travel) * (1.0 + narrow_mean) / (1.0 + wide_mean),
        density: narrow_mean,
        travel,
    }
}

/// Scores every shell cube. Each score is independent, so the parallel path
/// yields exactly the sequential results in the same order.
pub fn score_shell(
    lattice: &[Cube],
    shell: &[Cube],
    origin: Point3,
    parallel: bool,
) -> Vec<ScoredCube> {
    if parallel {
        shell
            .par_iter()
            .map(|cube| score_cube(lattice, origin, cube))
            .collect()
    } else {
        shell
            .iter()
            .map(|cube| score_cube(lattice, origin, cube))
            .collect()
    }
}

/// Keeps the scored cubes within the `q`th weight percentile, best first.
pub fn select_lowest(scored: &[ScoredCube], q: f64) -> Vec<ScoredCube> {
    let weights: Vec<f64> = scored.iter().map(|s| s.weight).collect();
    let Some(threshold) = percentile(&weights, q) else {
        return Vec::new();
    };
    let mut kept: Vec<ScoredCube> = scored
        .iter()
        .filter(|s| s.weight <= threshold)
        .copied()
        .collect();
    kept.sort_by(|a, b| a.weight.total_cmp(&b.weight));
    kept
}

/// Full ranking: re-measure the lattice against `target`, cut the proximity
/// shell, score it and keep the best fraction.
pub fn rank_candidates(
    lattice: &mut Lattice,
    origin: Point3,
    direction: Point3,
    target: Point3,
    shell_percentile: f64,
    candidate_percentile: f64,
    parallel: bool,
) -> Vec<ScoredCube> {
    lattice.rebase(target);
    let shell = proximity_shell(&lattice.cubes, origin, direction, shell_percentile);
    let scored = score_shell(&lattice.cubes, &shell, origin, parallel);
    select_lowest(&scored, candidate_percentile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::grid::density_weight;
    use assert_approx_eq::assert_approx_eq;

    fn cube(center: Point3, count: u32, target: Point3) -> Cube {
        let centroid_distance = center.distance(target);
        Cube {
            center,
            side: 10.0,
            count,
            centroid_distance,
            weight: density_weight(count, centroid_distance),
        }
    }

    fn lattice(target: Point3) -> Vec<Cube> {
        let mut cubes = Vec::new();
        for ix in 0..10i32 {
            for iy in -3..=3 {
                for iz in -2..=2 {
                    let center = Point3::new(
                        ix as f64 * 10.0 + 5.0,
                        iy as f64 * 10.0 + 5.0,
                        iz as f64 * 10.0 + 5.0,
                    );
                    let count = ((ix * 7 + iy * 3 + iz * 5).rem_euclid(4)) as u32;
                    cubes.push(cube(center, count, target));
                }
            }
        }
        cubes
    }

    #[test]
    fn percentile_interpolates_like_numpy() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_approx_eq!(percentile(&values, 0.0).unwrap(), 1.0);
        assert_approx_eq!(percentile(&values, 15.0).unwrap(), 1.6);
        assert_approx_eq!(percentile(&values, 100.0).unwrap(), 5.0);
        assert!(percentile(&[], 50.0).is_none());
    }

    #[test]
    fn shell_keeps_cubes_nearest_the_target() {
        let target = Point3::new(95.0, 5.0, 5.0);
        let cubes = lattice(target);
        let origin = Point3::new(5.0, 5.0, 5.0);
        let shell = proximity_shell(&cubes, origin, Point3::new(1.0, 0.0, 0.0), 5.0);

        assert!(!shell.is_empty());
        let threshold = percentile(
            &cubes.iter().map(|c| c.centroid_distance).collect::<Vec<_>>(),
            5.0,
        )
        .unwrap();
        assert!(shell.iter().all(|c| c.centroid_distance <= threshold));
        assert_eq!(shell[0].center.x, 95.0);
    }

    #[test]
    fn shell_drops_the_origin_cube() {
        let target = Point3::new(5.0, 5.0, 5.0);
        let cubes = lattice(target);
        let shell = proximity_shell(&cubes, target, Point3::new(1.0, 0.0, 0.0), 0.0);
        assert!(shell.is_empty());
    }

    #[test]
    fn score_matches_hand_computation() {
        let target = Point3::new(100.0, 0.0, 0.0);
        let origin = Point3::new(5.0, 5.0, 5.0);
        let cubes = vec![
            cube(origin, 2, target),
            cube(Point3::new(25.0, 5.0, 5.0), 4, target),
            cube(Point3::new(25.0, 205.0, 5.0), 9, target),
        ];
        let scored = score_cube(&cubes, origin, &cubes[1]);

        // the far cube sits outside both cylinders
        let narrow_sum = 2.0 + 4.0;
        let mean = 3.0;
        assert_approx_eq!(scored.travel, 20.0);
        assert_approx_eq!(scored.density, mean);
        assert_approx_eq!(scored.weight, narrow_sum / 21.0 * (1.0 + mean) / (1.0 + mean));
    }

    #[test]
    fn parallel_scoring_is_identical() {
        let target = Point3::new(95.0, 25.0, 5.0);
        let cubes = lattice(target);
        let origin = Point3::new(5.0, 5.0, 5.0);
        let shell = proximity_shell(&cubes, origin, Point3::new(1.0, 0.2, 0.0), 20.0);

        let sequential = score_shell(&cubes, &shell, origin, false);
        let parallel = score_shell(&cubes, &shell, origin, true);
        assert_eq!(sequential, parallel);
        assert_eq!(select_lowest(&sequential, 15.0), select_lowest(&parallel, 15.0));
    }

    #[test]
    fn selection_is_sorted_ascending() {
        let target = Point3::new(95.0, 25.0, 5.0);
        let mut cubes = Lattice {
            side: 10.0,
            cubes: lattice(target),
        };
        let ranked = rank_candidates(
            &mut cubes,
            Point3::new(5.0, 5.0, 5.0),
            Point3::new(1.0, 0.0, 0.0),
            target,
            10.0,
            50.0,
            true,
        );
        assert!(!ranked.is_empty());
        assert!(ranked.windows(2).all(|w| w[0].weight <= w[1].weight));
    }
}
