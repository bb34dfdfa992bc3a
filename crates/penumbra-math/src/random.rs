//! Seeded random stream

/// Linear congruential generator with a fixed, platform-independent sequence.
///
/// The low bits are poor; use [`RandomStream::fraction`] rather than taking
/// remainders of [`RandomStream::next_u32`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomStream {
    initial_seed: i32,
    seed: i32,
}

impl RandomStream {
    pub fn new(seed: i32) -> Self {
        Self {
            initial_seed: seed,
            seed,
        }
    }

    /// Rewind to the seed the stream was created with
    pub fn reset(&mut self) {
        self.seed = self.initial_seed;
    }

    pub fn initial_seed(&self) -> i32 {
        self.initial_seed
    }

    pub fn current_seed(&self) -> i32 {
        self.seed
    }

    /// Uniform value in `[0, 1)`.
    ///
    /// Built by splicing the low 23 seed bits into the mantissa of `1.0`,
    /// which yields a float in `[1, 2)`, then dropping the integer part.
    pub fn fraction(&mut self) -> f32 {
        self.mutate();
        let bits = (1.0_f32.to_bits() & 0xff80_0000) | (self.seed as u32 & 0x007f_ffff);
        f32::from_bits(bits).fract()
    }

    pub fn next_u32(&mut self) -> u32 {
        self.mutate();
        self.seed as u32
    }

    /// Uniform value in `[min, max)`
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + (max - min) * self.fraction()
    }

    fn mutate(&mut self) {
        self.seed = self.seed.wrapping_mul(196_314_165).wrapping_add(907_633_515);
    }
}

impl Default for RandomStream {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_values_from_seed_zero() {
        let mut stream = RandomStream::new(0);
        assert_eq!(stream.next_u32(), 907_633_515);

        let mut stream = RandomStream::new(0);
        let expected = f32::from_bits(0x3f80_0000 | (907_633_515_u32 & 0x007f_ffff)).fract();
        assert_eq!(stream.fraction(), expected);
    }

    #[test]
    fn fractions_stay_in_unit_interval() {
        let mut stream = RandomStream::new(1234);
        for _ in 0..10_000 {
            let f = stream.fraction();
            assert!((0.0..1.0).contains(&f), "fraction out of range: {f}");
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = RandomStream::new(42);
        let mut b = RandomStream::new(42);
        for _ in 0..100 {
            assert_eq!(a.fraction().to_bits(), b.fraction().to_bits());
        }
    }

    #[test]
    fn reset_rewinds_to_initial_seed() {
        let mut stream = RandomStream::new(7);
        let first = stream.next_u32();
        stream.next_u32();
        stream.reset();
        assert_eq!(stream.current_seed(), 7);
        assert_eq!(stream.next_u32(), first);
    }

    #[test]
    fn range_maps_fraction() {
        let mut stream = RandomStream::new(99);
        for _ in 0..1000 {
            let v = stream.range(-2.0, 3.0);
            assert!((-2.0..3.0).contains(&v));
        }
    }
}
