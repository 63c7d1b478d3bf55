//! Nearest-neighbor pressure estimation.
//!
//! Maps a wrist posture to the pressure of the closest reference entry under
//! squared Euclidean distance in angle space. No interpolation between
//! entries is performed.

use crate::dataset::PressureDataset;
use crate::{AngleSample, Error, ReferenceEntry, Result};

/// A pressure value and the reference entry it came from
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PressureEstimate {
    pub pressure: f64,
    /// Index of the matched entry in dataset order
    pub entry_index: usize,
    /// Squared angular distance to the matched entry
    pub distance_sq: f64,
}

/// Stateless lookup over a reference dataset
#[derive(Clone, Debug)]
pub struct PressureEstimator {
    dataset: PressureDataset,
}

impl PressureEstimator {
    pub fn new(dataset: PressureDataset) -> Self {
        Self { dataset }
    }

    pub fn dataset(&self) -> &PressureDataset {
        &self.dataset
    }

    /// Estimate pressure for a posture
    ///
    /// Returns `Error::DatasetEmpty` when there is nothing to match against;
    /// callers treat that as a zero pressure reading.
    pub fn estimate(&self, sample: AngleSample, typing: bool) -> Result<PressureEstimate> {
        let (entry_index, distance_sq) = self.nearest(sample).ok_or(Error::DatasetEmpty)?;
        let entry = &self.dataset.entries()[entry_index];

        Ok(PressureEstimate {
            pressure: entry.pressure(typing),
            entry_index,
            distance_sq,
        })
    }

    /// The reference entry an estimate was taken from
    pub fn entry(&self, estimate: &PressureEstimate) -> Option<&ReferenceEntry> {
        self.dataset.entries().get(estimate.entry_index)
    }

    /// Index and distance of the closest entry; first seen wins on ties
    fn nearest(&self, sample: AngleSample) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;

        for (index, entry) in self.dataset.entries().iter().enumerate() {
            let score = sample.distance_sq(entry.flexion_extension, entry.radial_ulnar);
            match best {
                Some((_, best_score)) if score >= best_score => {}
                _ => best = Some((index, score)),
            }
        }

        best
    }
}
