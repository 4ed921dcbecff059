//! Persisted planner parameters.
//!
//! The blob is a bincode encoding of [`PlannerWeights`]. It carries the
//! architecture it was produced for, and loading refuses any blob whose
//! architecture or tensor shapes disagree with the configured network.

use bincode::Options;
use rinkpilot_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

pub const WEIGHTS_FORMAT_VERSION: u32 = 1;

const MAX_WEIGHTS_SIZE: u64 = 256 * 1024 * 1024;

/// One named parameter tensor, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedTensor {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl NamedTensor {
    pub fn new(name: impl Into<String>, shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self { name: name.into(), shape, data }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerWeights {
    pub format_version: u32,
    pub channels: Vec<usize>,
    pub decoder_depth: usize,
    pub tensors: Vec<NamedTensor>,
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_WEIGHTS_SIZE)
}

impl PlannerWeights {
    pub fn load(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path).map_err(|e| {
            Error::ModelLoad(format!("cannot read weights at {:?}: {}", path, e))
        })?;
        if metadata.len() > MAX_WEIGHTS_SIZE {
            return Err(Error::ModelLoad(format!(
                "weights file too large: {} bytes (max {} bytes)",
                metadata.len(),
                MAX_WEIGHTS_SIZE
            )));
        }

        let bytes = fs::read(path)
            .map_err(|e| Error::ModelLoad(format!("cannot read weights at {:?}: {}", path, e)))?;
        let weights: PlannerWeights = codec()
            .deserialize(&bytes)
            .map_err(|e| Error::ModelLoad(format!("corrupt weights file {:?}: {}", path, e)))?;

        if weights.format_version != WEIGHTS_FORMAT_VERSION {
            return Err(Error::ModelLoad(format!(
                "unsupported weights format version {} (expected {})",
                weights.format_version, WEIGHTS_FORMAT_VERSION
            )));
        }

        info!(
            "Loaded {} planner tensors from {:?}",
            weights.tensors.len(),
            path
        );
        Ok(weights)
    }

    /// Write to `path`, creating parent directories. The blob is written to
    /// a temporary sibling first and renamed into place.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let bytes = codec().serialize(self)?;
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &bytes)?;
        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            Error::Io(e)
        })?;

        info!("Saved {} bytes of planner weights to {:?}", bytes.len(), path);
        Ok(())
    }

    pub fn into_store(self) -> TensorStore {
        TensorStore {
            tensors: self.tensors.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }
}

/// Name-indexed tensors consumed while building a network.
pub struct TensorStore {
    tensors: HashMap<String, NamedTensor>,
}

impl TensorStore {
    /// Remove `name`, checking it has exactly `shape`.
    pub fn take(&mut self, name: &str, shape: &[usize]) -> Result<Vec<f32>> {
        let tensor = self
            .tensors
            .remove(name)
            .ok_or_else(|| Error::ModelLoad(format!("missing tensor {}", name)))?;

        if tensor.shape != shape {
            return Err(Error::ModelLoad(format!(
                "tensor {} has shape {:?}, expected {:?}",
                name, tensor.shape, shape
            )));
        }

        let expected: usize = shape.iter().product();
        if tensor.data.len() != expected {
            return Err(Error::ModelLoad(format!(
                "tensor {} holds {} values, shape {:?} needs {}",
                name,
                tensor.data.len(),
                shape,
                expected
            )));
        }
        Ok(tensor.data)
    }

    /// Fails if any tensor was never consumed.
    pub fn finish(self) -> Result<()> {
        if self.tensors.is_empty() {
            return Ok(());
        }
        let mut names: Vec<_> = self.tensors.into_keys().collect();
        names.sort();
        Err(Error::ModelLoad(format!("unexpected tensors: {}", names.join(", "))))
    }
}
