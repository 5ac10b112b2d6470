// Copyright 2022 Spanfile
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::rng::Xorshift32;
use rand::Rng;
use tracing::trace;

/// A point in the working color space.
pub type Point = [f64; 3];

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansConfig {
    pub max_iter: usize,
    pub tol: f64,
    pub seed: u32,
    /// Initial centroids. Used only when there are exactly `min(k, points.len())` of them.
    pub warm_start: Option<Vec<Point>>,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            max_iter: crate::DEFAULT_MAX_ITER,
            tol: crate::DEFAULT_TOLERANCE,
            seed: crate::DEFAULT_SEED,
            warm_start: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansOutput {
    pub centroids: Vec<Point>,
    pub counts: Vec<usize>,
    /// Completed Lloyd rounds.
    pub iterations: usize,
    pub converged: bool,
    pub cancelled: bool,
    /// Sum of squared distances to the assigned centroid in the last completed assignment pass.
    pub inertia: f64,
}

impl KMeansOutput {
    fn empty() -> Self {
        Self {
            centroids: Vec::new(),
            counts: Vec::new(),
            iterations: 0,
            converged: true,
            cancelled: false,
            inertia: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct ClusterPartial {
    sum: Point,
    count: usize,
}

/// Partition `points` into at most `k` clusters.
///
/// `should_cancel` is polled before every point of each assignment pass and after every update.
/// Once it returns true the run stops and reports the centroids and counts of the last completed
/// round.
pub fn run_kmeans<C>(points: &[Point], k: usize, config: &KMeansConfig, mut should_cancel: C) -> KMeansOutput
where
    C: FnMut() -> bool,
{
    if k == 0 || points.is_empty() {
        return KMeansOutput::empty();
    }

    let k = k.min(points.len());
    let mut rng = Xorshift32::new(config.seed);

    let mut centroids = match &config.warm_start {
        Some(warm_start) if warm_start.len() == k => warm_start.clone(),
        _ => kmeans_plus_plus(points, k, &mut rng),
    };

    let mut counts = vec![0; k];
    let mut partials = vec![ClusterPartial::default(); k];
    let mut iterations = 0;
    let mut converged = false;
    let mut inertia = 0.0;

    while iterations < config.max_iter {
        partials.fill(ClusterPartial::default());
        let mut pass_inertia = 0.0;

        for point in points {
            if should_cancel() {
                return KMeansOutput {
                    centroids,
                    counts,
                    iterations,
                    converged,
                    cancelled: true,
                    inertia,
                };
            }

            let (nearest, distance) = nearest_centroid(point, &centroids);
            let partial = &mut partials[nearest];
            partial.count += 1;
            for (sum, coord) in partial.sum.iter_mut().zip(point) {
                *sum += coord;
            }

            pass_inertia += distance;
        }

        let mut max_shift: f64 = 0.0;
        for ((centroid, partial), count) in centroids.iter_mut().zip(&partials).zip(counts.iter_mut()) {
            *count = partial.count;

            if partial.count == 0 {
                // empty clusters are reseeded instead of left behind
                *centroid = points[rng.gen_range(0..points.len())];
                continue;
            }

            let inv = 1.0 / partial.count as f64;
            let mean = partial.sum.map(|sum| sum * inv);

            max_shift = max_shift.max(squared_distance(centroid, &mean).sqrt());
            *centroid = mean;
        }

        iterations += 1;
        inertia = pass_inertia;
        trace!(iterations, max_shift, inertia, "k-means round");

        if max_shift <= config.tol {
            converged = true;
            break;
        }

        if should_cancel() {
            return KMeansOutput {
                centroids,
                counts,
                iterations,
                converged,
                cancelled: true,
                inertia,
            };
        }
    }

    KMeansOutput {
        centroids,
        counts,
        iterations,
        converged,
        cancelled: false,
        inertia,
    }
}

fn nearest_centroid(point: &Point, centroids: &[Point]) -> (usize, f64) {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;

    // strict comparison keeps the lowest index on ties
    for (idx, centroid) in centroids.iter().enumerate() {
        let distance = squared_distance(point, centroid);
        if distance < best_distance {
            best = idx;
            best_distance = distance;
        }
    }

    (best, best_distance)
}

fn squared_distance(a: &Point, b: &Point) -> f64 {
    a.iter().zip(b).map(|(a, b)| (a - b) * (a - b)).sum()
}

/// D²-weighted seeding. Requires `1 <= k <= points.len()`.
fn kmeans_plus_plus(points: &[Point], k: usize, rng: &mut Xorshift32) -> Vec<Point> {
    let n = points.len();
    let mut centroids = Vec::with_capacity(k);
    let mut chosen = vec![false; n];

    let first = rng.gen_range(0..n);
    chosen[first] = true;
    centroids.push(points[first]);

    let mut distances: Vec<f64> = points.iter().map(|p| squared_distance(p, &points[first])).collect();

    while centroids.len() < k {
        let sum: f64 = distances
            .iter()
            .zip(&chosen)
            .filter_map(|(&distance, &chosen)| (!chosen).then_some(distance))
            .sum();

        let next = if sum > 0.0 {
            let mut threshold = rng.gen::<f64>() * sum;
            let mut pick = None;
            let mut last_candidate = None;

            for (idx, &distance) in distances.iter().enumerate() {
                if chosen[idx] {
                    continue;
                }

                if distance > 0.0 {
                    last_candidate = Some(idx);
                }

                threshold -= distance;
                if threshold <= 0.0 && distance > 0.0 {
                    pick = Some(idx);
                    break;
                }
            }

            // rounding can leave a sliver of threshold after the last point
            pick.or(last_candidate)
        } else {
            None
        };

        let next = match next {
            Some(idx) => idx,
            None => {
                // every remaining point coincides with a chosen centroid
                let unchosen: Vec<usize> = (0..n).filter(|&idx| !chosen[idx]).collect();
                unchosen[rng.gen_range(0..unchosen.len())]
            }
        };

        chosen[next] = true;
        centroids.push(points[next]);

        for (distance, point) in distances.iter_mut().zip(points) {
            *distance = distance.min(squared_distance(point, &points[next]));
        }
    }

    centroids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<Point> {
        let mut rng = Xorshift32::new(99);
        let mut points = Vec::new();

        for _ in 0..120 {
            points.push([
                10.0 + rng.gen::<f64>() * 5.0,
                12.0 + rng.gen::<f64>() * 5.0,
                14.0 + rng.gen::<f64>() * 5.0,
            ]);
        }

        for _ in 0..150 {
            points.push([
                200.0 + rng.gen::<f64>() * 5.0,
                210.0 + rng.gen::<f64>() * 5.0,
                205.0 + rng.gen::<f64>() * 5.0,
            ]);
        }

        points
    }

    fn config(seed: u32) -> KMeansConfig {
        KMeansConfig {
            max_iter: 50,
            tol: 0.01,
            seed,
            warm_start: None,
        }
    }

    #[test]
    fn separates_obvious_clusters() {
        let points = two_blobs();
        let output = run_kmeans(&points, 2, &config(123), || false);

        assert!(output.converged);
        assert!(!output.cancelled);

        let mut counts = output.counts.clone();
        counts.sort_unstable();
        assert_eq!(counts, vec![120, 150]);
    }

    #[test]
    fn degenerate_inputs() {
        let output = run_kmeans(&[], 3, &config(1), || false);
        assert!(output.centroids.is_empty());
        assert!(output.converged);
        assert!(!output.cancelled);

        let output = run_kmeans(&two_blobs(), 0, &config(1), || false);
        assert!(output.counts.is_empty());
        assert!(output.converged);
    }

    #[test]
    fn k_is_capped_by_point_count() {
        let points = [[1.0, 2.0, 3.0], [50.0, 60.0, 70.0]];
        let output = run_kmeans(&points, 5, &config(4), || false);

        assert_eq!(output.centroids.len(), 2);
        assert_eq!(output.counts.iter().sum::<usize>(), 2);
    }

    #[test]
    fn deterministic_for_a_seed() {
        let points = two_blobs();
        let first = run_kmeans(&points, 3, &config(123), || false);
        let second = run_kmeans(&points, 3, &config(123), || false);

        assert_eq!(first, second);
    }

    #[test]
    fn warm_start_takes_no_more_rounds() {
        let points = two_blobs();
        let first = run_kmeans(&points, 2, &config(456), || false);

        let warm = KMeansConfig {
            warm_start: Some(first.centroids.clone()),
            ..config(1)
        };
        let second = run_kmeans(&points, 2, &warm, || false);

        assert!(second.iterations <= first.iterations);
        assert!(second.converged);
    }

    #[test]
    fn mismatched_warm_start_falls_back() {
        let points = two_blobs();
        let warm = KMeansConfig {
            warm_start: Some(vec![[0.0, 0.0, 0.0]]),
            ..config(123)
        };

        assert_eq!(
            run_kmeans(&points, 2, &warm, || false),
            run_kmeans(&points, 2, &config(123), || false)
        );
    }

    #[test]
    fn cancels_before_the_first_round() {
        let points = two_blobs();
        let output = run_kmeans(&points, 2, &config(1), || true);

        assert!(output.cancelled);
        assert_eq!(output.iterations, 0);
        assert!(output.counts.iter().all(|&c| c == 0));
    }

    #[test]
    fn cancels_mid_pass() {
        let points = two_blobs();
        let mut polls = 0;
        let output = run_kmeans(&points, 2, &config(1), || {
            polls += 1;
            polls > 10
        });

        assert!(output.cancelled);
        assert_eq!(output.iterations, 0);
    }

    #[test]
    fn reports_completed_rounds_when_cancelled_later() {
        let points = two_blobs();
        let per_round = points.len() + 1;
        let mut polls = 0;
        let output = run_kmeans(
            &points,
            2,
            &KMeansConfig {
                tol: 0.0,
                max_iter: 100,
                ..config(7)
            },
            || {
                polls += 1;
                polls > per_round + 5
            },
        );

        assert!(output.cancelled);
        assert_eq!(output.iterations, 1);
        assert_eq!(output.counts.iter().sum::<usize>(), points.len());
    }

    #[test]
    fn iteration_cap() {
        let points = two_blobs();
        let output = run_kmeans(
            &points,
            8,
            &KMeansConfig {
                max_iter: 2,
                tol: 0.0,
                ..config(3)
            },
            || false,
        );

        assert!(output.iterations <= 2);
    }

    #[test]
    fn identical_points_seed_distinct_indices() {
        let points = vec![[5.0, 5.0, 5.0]; 6];
        let output = run_kmeans(&points, 3, &config(11), || false);

        assert_eq!(output.centroids.len(), 3);
        assert_eq!(output.counts.iter().sum::<usize>(), 6);
        // ties go to the lowest index
        assert_eq!(output.counts[0], 6);
        assert!(output.converged);
    }

    #[test]
    fn empty_clusters_are_reseeded_from_the_data() {
        let points = vec![[0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [100.0, 100.0, 100.0]];
        let warm = KMeansConfig {
            warm_start: Some(vec![[0.0, 0.0, 0.0], [1000.0, 1000.0, 1000.0], [100.0, 100.0, 100.0]]),
            max_iter: 1,
            ..config(2)
        };
        let output = run_kmeans(&points, 3, &warm, || false);

        assert_eq!(output.counts, vec![2, 0, 1]);
        assert!(points.contains(&output.centroids[1]));
    }

    /// Largest centroid movement during the last round of `output`, found by replaying the run one
    /// round short. Runs are deterministic for a seed, so the replay ends where the final round began.
    fn final_round_shifts(points: &[Point], k: usize, config: &KMeansConfig, output: &KMeansOutput) -> Vec<f64> {
        let before = run_kmeans(
            points,
            k,
            &KMeansConfig {
                max_iter: output.iterations - 1,
                ..config.clone()
            },
            || false,
        );

        before
            .centroids
            .iter()
            .zip(&output.centroids)
            .map(|(a, b)| squared_distance(a, b).sqrt())
            .collect()
    }

    #[test]
    fn converged_final_round_moves_within_tolerance() {
        let points = two_blobs();

        for (k, tol) in [(2, 0.01), (3, 0.5), (5, 2.0)] {
            let cfg = KMeansConfig { tol, ..config(31) };
            let output = run_kmeans(&points, k, &cfg, || false);

            assert!(output.converged);
            for shift in final_round_shifts(&points, k, &cfg, &output) {
                assert!(shift <= tol, "k={k} moved {shift} with tolerance {tol}");
            }
        }
    }

    #[test]
    fn reseeded_cluster_does_not_block_convergence() {
        let points = vec![[0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [100.0, 100.0, 100.0]];
        let warm = KMeansConfig {
            warm_start: Some(vec![[0.0, 0.0, 0.0], [1000.0, 1000.0, 1000.0], [100.0, 100.0, 100.0]]),
            max_iter: 10,
            ..config(2)
        };
        let output = run_kmeans(&points, 3, &warm, || false);

        assert!(output.converged);
        assert_eq!(output.iterations, 1);
        assert_eq!(output.counts, vec![2, 0, 1]);

        let shifts = final_round_shifts(&points, 3, &warm, &output);
        assert!(shifts[0] <= warm.tol);
        assert!(shifts[2] <= warm.tol);
        // the reseeded centroid jumped far more than the tolerance
        assert!(shifts[1] > warm.tol);
    }

    #[test]
    fn inertia_is_zero_for_exact_fit() {
        let points = vec![[0.0, 0.0, 0.0], [10.0, 10.0, 10.0]];
        let output = run_kmeans(&points, 2, &config(1), || false);
        assert_eq!(output.inertia, 0.0);
    }
}
