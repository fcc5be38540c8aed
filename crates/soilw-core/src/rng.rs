//! A minimal PCG32 generator, reimplemented from the source's
//! `rands.c` rather than drawn from the `rand` crate.
//!
//! The weather-generator reproducibility tests (spec scenario 3) pin
//! an exact bit-stream for a given `(seed_state, seed_sequence)` pair.
//! `rand::StdRng`'s algorithm is an implementation detail that can
//! change between crate versions, so it cannot satisfy that contract;
//! PCG32's multiplier, increment derivation, and XSH-RR output
//! permutation are public and stable, so we reimplement them directly.
//!
//! Each stochastic role in a [`crate::run::Run`] (the Markov weather
//! generator, and any future stochastic process) owns its own
//! [`Pcg32`] instance — streams never share state.

const PCG_MULTIPLIER: u64 = 6364136223846793005;

/// One independent PCG32 stream: 64 bits of LCG state plus a 64-bit
/// odd increment derived from the sequence selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pcg32 {
    state: u64,
    inc: u64,
}

impl Pcg32 {
    /// Seed a stream exactly as `pcg32_srandom_r`: the increment is
    /// `(seed_sequence << 1) | 1` (forced odd, required for the LCG's
    /// full period), then the state is advanced once and offset by
    /// `seed_state` before a first step.
    pub fn new(seed_state: u64, seed_sequence: u64) -> Self {
        let mut rng = Pcg32 {
            state: 0,
            inc: (seed_sequence << 1) | 1,
        };
        rng.step();
        rng.state = rng.state.wrapping_add(seed_state);
        rng.step();
        rng
    }

    fn step(&mut self) {
        self.state = self
            .state
            .wrapping_mul(PCG_MULTIPLIER)
            .wrapping_add(self.inc);
    }

    /// Next raw 32-bit output (XSH-RR permutation of the pre-step
    /// state), advancing the stream.
    pub fn next_u32(&mut self) -> u32 {
        let old_state = self.state;
        self.step();
        let xorshifted = (((old_state >> 18) ^ old_state) >> 27) as u32;
        let rot = (old_state >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    /// Uniform draw in `[0, 1)`, matching `RandUni`'s `ldexp(x, -32)`.
    pub fn uniform(&mut self) -> f64 {
        self.next_u32() as f64 * 2f64.powi(-32)
    }

    /// Uniform integer draw in `[first, last]` inclusive.
    pub fn uniform_int_range(&mut self, first: i64, last: i64) -> i64 {
        if last <= first {
            return first;
        }
        let span = (last - first + 1) as f64;
        first + (self.uniform() * span).floor() as i64
    }

    /// Standard-normal draw via Box-Muller, then scaled to
    /// `Normal(mean, stddev)`, matching `RandNorm`'s contract.
    pub fn normal(&mut self, mean: f64, stddev: f64) -> f64 {
        let u1 = self.uniform().max(f64::MIN_POSITIVE);
        let u2 = self.uniform();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + stddev * z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_reproduces_stream() {
        let mut a = Pcg32::new(7, 1);
        let mut b = Pcg32::new(7, 1);
        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn different_sequence_selector_diverges() {
        let mut a = Pcg32::new(7, 1);
        let mut b = Pcg32::new(7, 2);
        let draws_a: Vec<u32> = (0..20).map(|_| a.next_u32()).collect();
        let draws_b: Vec<u32> = (0..20).map(|_| b.next_u32()).collect();
        assert_ne!(draws_a, draws_b);
    }

    #[test]
    fn different_state_seed_diverges() {
        let mut a = Pcg32::new(7, 1);
        let mut b = Pcg32::new(1, 1);
        let draws_a: Vec<u32> = (0..20).map(|_| a.next_u32()).collect();
        let draws_b: Vec<u32> = (0..20).map(|_| b.next_u32()).collect();
        assert_ne!(draws_a, draws_b);
    }

    #[test]
    fn uniform_is_in_unit_interval() {
        let mut rng = Pcg32::new(42, 5);
        for _ in 0..1000 {
            let u = rng.uniform();
            assert!((0.0..1.0).contains(&u));
        }
    }
}
