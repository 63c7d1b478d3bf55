//! Reference table of wrist postures and measured carpal tunnel pressures.
//!
//! The built-in table ships with the library; a custom table in the same
//! JSON layout can be loaded from disk. Entry order is preserved exactly as
//! read, since nearest-neighbor ties resolve to the earliest entry.

use crate::{Error, ReferenceEntry, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::path::Path;

const BUILTIN_DATASET_JSON: &str = include_str!("../data/wrist_pressure.json");

/// Cached built-in dataset, parsed once
static DEFAULT_DATASET: Lazy<PressureDataset> = Lazy::new(|| {
    match PressureDataset::from_json(BUILTIN_DATASET_JSON) {
        Ok(dataset) => dataset,
        Err(e) => {
            tracing::error!("Built-in pressure dataset is invalid: {}", e);
            PressureDataset::default()
        }
    }
});

/// Get a reference to the cached built-in dataset
pub fn default_dataset() -> &'static PressureDataset {
    &DEFAULT_DATASET
}

/// On-disk layout of a dataset file
#[derive(Debug, Deserialize)]
struct DatasetFile {
    #[serde(default)]
    entries: Vec<ReferenceEntry>,
}

/// Immutable list of reference entries
#[derive(Clone, Debug, Default)]
pub struct PressureDataset {
    entries: Vec<ReferenceEntry>,
}

impl PressureDataset {
    /// Build a dataset from entries, keeping their order
    pub fn from_entries(entries: Vec<ReferenceEntry>) -> Result<Self> {
        for (index, entry) in entries.iter().enumerate() {
            let numbers = [
                entry.flexion_extension,
                entry.radial_ulnar,
                entry.pressure_typing,
                entry.pressure_static,
            ];
            if numbers.iter().any(|v| !v.is_finite()) {
                return Err(Error::Dataset(format!(
                    "entry {} ({:?}) contains a non-finite value",
                    index, entry.label
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Parse a dataset from its JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let file: DatasetFile = serde_json::from_str(json)?;
        Self::from_entries(file.entries)
    }

    /// Load a dataset file from disk
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let dataset = Self::from_json(&contents)?;
        tracing::info!(
            "Loaded {} reference entries from {:?}",
            dataset.len(),
            path
        );
        Ok(dataset)
    }

    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
