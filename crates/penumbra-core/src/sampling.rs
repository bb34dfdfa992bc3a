//! Stratified sample directions over the full sphere
//!
//! Two stratified hemispheres are drawn from one seeded stream; the second
//! is mirrored through the XY plane. The set is generated once per bake and
//! shared read-only by every worker.

use glam::Vec3;
use penumbra_math::RandomStream;
use std::f32::consts::PI;

/// Sample budget used when the caller does not ask for another one
pub const DEFAULT_SAMPLE_COUNT: u32 = 1200;

/// Larger budgets are clamped to this (51 x 160 x 2 = 16320 directions)
pub const MAX_SAMPLE_COUNT: u32 = 16_384;

/// Ordered, deterministic set of unit ray directions
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleDirections {
    directions: Vec<Vec3>,
}

impl SampleDirections {
    /// Generate directions for a budget of roughly `num_samples`.
    ///
    /// Each hemisphere uses `theta = floor(sqrt(n / 2π))` by
    /// `phi = floor(theta * π)` cells, so 1200 yields 13 x 40 x 2 = 1040
    /// directions. Budgets too small for a full theta band still get one,
    /// and budgets above [`MAX_SAMPLE_COUNT`] are clamped to it.
    pub fn generate(num_samples: u32, seed: i32) -> Self {
        let (theta_steps, phi_steps) = Self::steps_for(num_samples);
        let mut stream = RandomStream::new(seed);

        let mut directions = stratified_hemisphere(theta_steps, phi_steps, &mut stream);
        let other = stratified_hemisphere(theta_steps, phi_steps, &mut stream);
        directions.extend(other.into_iter().map(|d| Vec3::new(d.x, d.y, -d.z)));

        Self { directions }
    }

    /// `(theta_steps, phi_steps)` for a sample budget
    pub fn steps_for(num_samples: u32) -> (u32, u32) {
        let num_samples = num_samples.min(MAX_SAMPLE_COUNT);
        let theta = ((num_samples as f32 / (2.0 * PI)).sqrt() as u32).max(1);
        let phi = ((theta as f32 * PI) as u32).max(1);
        (theta, phi)
    }

    pub fn len(&self) -> usize {
        self.directions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }

    pub fn as_slice(&self) -> &[Vec3] {
        &self.directions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Vec3> {
        self.directions.iter()
    }
}

impl<'a> IntoIterator for &'a SampleDirections {
    type Item = &'a Vec3;
    type IntoIter = std::slice::Iter<'a, Vec3>;

    fn into_iter(self) -> Self::IntoIter {
        self.directions.iter()
    }
}

/// Jittered samples of the +Z hemisphere, one per `(theta, phi)` cell.
///
/// The stream is advanced twice per cell, so calling this twice on the same
/// stream gives two independent sets.
pub fn stratified_hemisphere(theta_steps: u32, phi_steps: u32, stream: &mut RandomStream) -> Vec<Vec3> {
    let mut samples = Vec::with_capacity((theta_steps * phi_steps) as usize);

    for theta_index in 0..theta_steps {
        for phi_index in 0..phi_steps {
            let u1 = stream.fraction();
            let u2 = stream.fraction();

            let fraction1 = (theta_index as f32 + u1) / theta_steps as f32;
            let fraction2 = (phi_index as f32 + u2) / phi_steps as f32;

            let r = (1.0 - fraction1 * fraction1).sqrt();
            let phi = 2.0 * PI * fraction2;

            samples.push(Vec3::new(phi.cos() * r, phi.sin() * r, fraction1));
        }
    }

    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_budget_step_counts() {
        assert_eq!(SampleDirections::steps_for(DEFAULT_SAMPLE_COUNT), (13, 40));
        let set = SampleDirections::generate(DEFAULT_SAMPLE_COUNT, 0);
        assert_eq!(set.len(), 1040);
    }

    #[test]
    fn tiny_budget_still_samples() {
        assert_eq!(SampleDirections::steps_for(0), (1, 3));
        assert_eq!(SampleDirections::generate(1, 0).len(), 6);
    }

    #[test]
    fn huge_budget_is_clamped() {
        assert_eq!(SampleDirections::steps_for(MAX_SAMPLE_COUNT), (51, 160));
        assert_eq!(SampleDirections::steps_for(u32::MAX), (51, 160));
        assert_eq!(SampleDirections::generate(u32::MAX, 0).len(), 16_320);
    }

    #[test]
    fn directions_are_unit_length() {
        let set = SampleDirections::generate(DEFAULT_SAMPLE_COUNT, 0);
        for d in &set {
            assert_relative_eq!(d.length(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn halves_cover_opposite_hemispheres() {
        let set = SampleDirections::generate(DEFAULT_SAMPLE_COUNT, 0);
        let (upper, lower) = set.as_slice().split_at(set.len() / 2);
        assert!(upper.iter().all(|d| d.z >= 0.0));
        assert!(lower.iter().all(|d| d.z <= 0.0));
    }

    #[test]
    fn second_hemisphere_continues_the_stream() {
        let set = SampleDirections::generate(DEFAULT_SAMPLE_COUNT, 0);
        let (upper, lower) = set.as_slice().split_at(set.len() / 2);
        let mirrored: Vec<Vec3> = lower.iter().map(|d| Vec3::new(d.x, d.y, -d.z)).collect();
        assert_ne!(upper, mirrored.as_slice());
    }

    #[test]
    fn same_seed_is_bit_identical() {
        let a = SampleDirections::generate(DEFAULT_SAMPLE_COUNT, 0);
        let b = SampleDirections::generate(DEFAULT_SAMPLE_COUNT, 0);
        let bits = |s: &SampleDirections| -> Vec<[u32; 3]> {
            s.iter()
                .map(|d| [d.x.to_bits(), d.y.to_bits(), d.z.to_bits()])
                .collect()
        };
        assert_eq!(bits(&a), bits(&b));
        assert_ne!(a, SampleDirections::generate(DEFAULT_SAMPLE_COUNT, 1));
    }

    #[test]
    fn strata_spread_over_sphere() {
        // Mean direction of a well-stratified full sphere is near zero
        let set = SampleDirections::generate(DEFAULT_SAMPLE_COUNT, 0);
        let mean = set.iter().copied().sum::<Vec3>() / set.len() as f32;
        assert!(mean.length() < 0.05, "mean direction {mean:?}");
    }
}
