//! CPU implementation of the integration kernel.
//!
//! Mirrors `shaders/integrate.wgsl` operation for operation so GPU output
//! can be checked against it.  Also provides the seeded initial data set
//! used by the binary, the tests and the benchmark.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::record::{Record, SimParams};

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn length(v: [f32; 3]) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Net force acting on record `i`.
pub fn force_on(records: &[Record], i: usize, params: &SimParams) -> [f32; 3] {
    let p = records[i].position;
    let mut force = [0.0f32; 3];
    for (j, other) in records.iter().enumerate() {
        if j == i {
            continue;
        }
        let d = sub(other.position, p);
        let dist = length(d);
        // Coincident points have no direction.
        if dist == 0.0 {
            continue;
        }
        let magnitude = params.k * (dist - params.rest_length);
        for axis in 0..3 {
            force[axis] += magnitude * (d[axis] / dist);
        }
    }
    force
}

/// One explicit Euler step over the whole set.
///
/// Positions advance with the pre-step velocity; velocities then pick up
/// `force / mass * dt`.
pub fn step(records: &[Record], params: &SimParams) -> Vec<Record> {
    (0..records.len())
        .map(|i| {
            let force = force_on(records, i, params);
            let Record { position, velocity } = records[i];
            let mut next = Record::default();
            for axis in 0..3 {
                next.position[axis] = position[axis] + velocity[axis] * params.dt;
                next.velocity[axis] = velocity[axis] + (force[axis] / params.mass) * params.dt;
            }
            next
        })
        .collect()
}

/// Applies [`step`] `iterations` times and returns every intermediate state.
///
/// Entry `k` of the result is the state after `k + 1` steps.
pub fn simulate(initial: &[Record], params: &SimParams, iterations: usize) -> Vec<Vec<Record>> {
    let mut states = Vec::with_capacity(iterations);
    let mut current = initial.to_vec();
    for _ in 0..iterations {
        current = step(&current, params);
        states.push(current.clone());
    }
    states
}

/// `n` records at rest with positions drawn uniformly from `[0, 1)^3`.
pub fn seeded_points(n: usize, seed: u64) -> Vec<Record> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            Record::at_rest([
                rng.gen_range(0.0f32..1.0),
                rng.gen_range(0.0f32..1.0),
                rng.gen_range(0.0f32..1.0),
            ])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_record_feels_no_force() {
        let params = SimParams::default();
        let records = vec![Record {
            position: [0.3, 0.4, 0.5],
            velocity: [1.0, 0.0, -1.0],
        }];
        assert_eq!(force_on(&records, 0, &params), [0.0; 3]);

        let next = step(&records, &params);
        assert_eq!(next[0].velocity, [1.0, 0.0, -1.0]);
        assert!((next[0].position[0] - 0.31).abs() < 1e-6);
        assert!((next[0].position[2] - 0.49).abs() < 1e-6);
    }

    #[test]
    fn mirrored_pair_gets_opposite_velocities() {
        let params = SimParams::default();
        let records = vec![
            Record::at_rest([0.5, -0.25, 0.1]),
            Record::at_rest([-0.5, 0.25, -0.1]),
        ];
        let next = step(&records, &params);
        for axis in 0..3 {
            assert!((next[0].velocity[axis] + next[1].velocity[axis]).abs() < 1e-7);
        }
        // Beyond the rest length the spring pulls the pair together.
        assert!(next[0].velocity[0] < 0.0);
        assert!(next[1].velocity[0] > 0.0);
    }

    #[test]
    fn inside_rest_length_pushes_apart() {
        let params = SimParams::default();
        let records = vec![Record::at_rest([0.0; 3]), Record::at_rest([0.1, 0.0, 0.0])];
        let f = force_on(&records, 0, &params);
        // k * (0.1 - 0.2) < 0: record 0 is pushed towards -x
        assert!((f[0] + 0.001).abs() < 1e-7);
        assert_eq!(f[1], 0.0);
    }

    #[test]
    fn coincident_records_are_skipped() {
        let params = SimParams::default();
        let records = vec![Record::at_rest([0.2; 3]), Record::at_rest([0.2; 3])];
        let next = step(&records, &params);
        assert!(next.iter().all(|r| r.velocity == [0.0; 3]));
    }

    #[test]
    fn simulate_matches_repeated_steps() {
        let params = SimParams::default();
        let initial = seeded_points(6, 7);
        let states = simulate(&initial, &params, 3);
        assert_eq!(states.len(), 3);
        let by_hand = step(&step(&step(&initial, &params), &params), &params);
        assert_eq!(states[2], by_hand);
        assert_eq!(states[0], step(&initial, &params));
    }

    #[test]
    fn seeded_points_are_reproducible_and_in_range() {
        let a = seeded_points(32, 42);
        let b = seeded_points(32, 42);
        assert_eq!(a, b);
        assert_ne!(a, seeded_points(32, 43));
        for r in &a {
            assert_eq!(r.velocity, [0.0; 3]);
            assert!(r.position.iter().all(|c| (0.0..1.0).contains(c)));
        }
    }
}
