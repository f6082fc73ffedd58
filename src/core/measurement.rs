use std::hash::Hasher;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use siphasher::sip::SipHasher13;

use crate::core::model::NamedValue;

/// Stimulus applied for one measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stimulus {
    pub current: f64,
    pub voltage: f64,
}

/// A scalar measurement together with the values recorded on its step.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub value: f64,
    pub inputs: Vec<NamedValue>,
    pub outputs: Vec<NamedValue>,
}

/// A pluggable measurement function.
pub trait MeasurementSource {
    /// Returns the name of the source.
    fn name(&self) -> &'static str;

    /// Takes one measurement. Implementations draw all randomness from `rng`.
    fn measure(&self, stimulus: &Stimulus, rng: &mut dyn RngCore) -> Measurement;
}

/// Derives the random stream for one stimulus group from the master seed.
///
/// Each group owns an independent stream so results do not depend on scheduling.
pub fn group_rng(seed: u64, group: usize) -> StdRng {
    StdRng::seed_from_u64(derive_substream_seed(seed, group as u64))
}

/// Seed of substream `substream`: SipHash-1-3 with zero keys over `(master_seed, substream)`.
pub fn derive_substream_seed(master_seed: u64, substream: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master_seed);
    hasher.write_u64(substream);
    hasher.finish()
}
