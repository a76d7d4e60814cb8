use rand::Rng;

/// Generates star positions sampled uniformly over concentric spherical
/// shells between `r_min` and `r_max`.
///
/// Returns a flat `[x, y, z, x, y, z, ..]` buffer of `3 * count` floats.
/// The polar angle comes from `acos` of a uniform variate in [-1, 1] so
/// density is uniform over the sphere surface instead of clustering at the
/// poles. Deterministic for a seeded rng; `count == 0` yields an empty
/// buffer.
pub fn generate_star_positions<R: Rng>(
    rng: &mut R,
    count: usize,
    r_min: f32,
    r_max: f32,
) -> Vec<f32> {
    let mut positions = Vec::with_capacity(count * 3);

    for _ in 0..count {
        let r = rng.gen_range(r_min..=r_max);
        let theta = rng.gen_range(0.0..std::f32::consts::TAU);
        let phi = rng.gen_range(-1.0f32..=1.0).acos();

        positions.push(r * phi.sin() * theta.cos());
        positions.push(r * phi.sin() * theta.sin());
        positions.push(r * phi.cos());
    }

    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn returns_three_floats_per_star() {
        let mut rng = SmallRng::seed_from_u64(7);
        for count in [0usize, 1, 100, 4000] {
            let positions = generate_star_positions(&mut rng, count, 80.0, 800.0);
            assert_eq!(positions.len(), count * 3);
        }
    }

    #[test]
    fn zero_count_is_empty_not_an_error() {
        let mut rng = SmallRng::seed_from_u64(0);
        assert!(generate_star_positions(&mut rng, 0, 10.0, 20.0).is_empty());
    }

    #[test]
    fn radii_stay_within_shell_bounds() {
        // Property check over a handful of seeds.
        for seed in 0..16u64 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let positions = generate_star_positions(&mut rng, 500, 10.0, 20.0);

            for star in positions.chunks_exact(3) {
                let r = (star[0] * star[0] + star[1] * star[1] + star[2] * star[2]).sqrt();
                assert!(
                    (10.0 - 1e-3..=20.0 + 1e-3).contains(&r),
                    "star radius {} outside [10, 20] for seed {}",
                    r,
                    seed
                );
            }
        }
    }

    #[test]
    fn seeded_generation_is_reproducible() {
        let mut a = SmallRng::seed_from_u64(42);
        let mut b = SmallRng::seed_from_u64(42);

        let first = generate_star_positions(&mut a, 256, 80.0, 800.0);
        let second = generate_star_positions(&mut b, 256, 80.0, 800.0);
        assert_eq!(first, second);
    }

    #[test]
    fn stars_cover_both_hemispheres() {
        let mut rng = SmallRng::seed_from_u64(3);
        let positions = generate_star_positions(&mut rng, 2000, 80.0, 800.0);

        let above = positions.chunks_exact(3).filter(|p| p[2] > 0.0).count();
        let below = positions.chunks_exact(3).filter(|p| p[2] < 0.0).count();

        // Uniform surface sampling should not pile everything on one pole.
        assert!(above > 600, "only {} stars above equator", above);
        assert!(below > 600, "only {} stars below equator", below);
    }
}
