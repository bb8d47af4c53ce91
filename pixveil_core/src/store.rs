//! Persistence of side-channel artifacts.
//!
//! Encode hands its noise matrix and permutation to an [`ArtifactStore`];
//! decode reads them back. Any store must return values identical to what it
//! was given: same element order, same values, `u64` index width. The JSON
//! stores below write one versioned document per artifact and validate on read.
//!
//! Files are written to a temporary sibling and renamed over the target, so a
//! failed save never leaves a truncated or mismatched artifact behind.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::noise::NoiseMatrix;
use crate::permutation::PermutationIndices;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("artifact encoding failed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("no {0} artifact has been stored")]
    Missing(&'static str),
}

pub trait ArtifactStore {
    fn save_noise(&mut self, noise: &NoiseMatrix) -> Result<(), StoreError>;
    fn load_noise(&self) -> Result<NoiseMatrix, StoreError>;
    fn save_permutation(&mut self, indices: &PermutationIndices) -> Result<(), StoreError>;
    fn load_permutation(&self) -> Result<PermutationIndices, StoreError>;

    /// Stores both artifacts of one encode pass. On error the previously
    /// stored pair is left as it was.
    fn save_artifacts(
        &mut self,
        noise: &NoiseMatrix,
        indices: &PermutationIndices,
    ) -> Result<(), StoreError>;
}

/// Two JSON files, one for the noise matrix and one for the permutation.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    noise_path: PathBuf,
    permutation_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(noise_path: impl Into<PathBuf>, permutation_path: impl Into<PathBuf>) -> Self {
        Self {
            noise_path: noise_path.into(),
            permutation_path: permutation_path.into(),
        }
    }

    pub fn noise_path(&self) -> &Path {
        &self.noise_path
    }

    pub fn permutation_path(&self) -> &Path {
        &self.permutation_path
    }
}

impl ArtifactStore for JsonFileStore {
    fn save_noise(&mut self, noise: &NoiseMatrix) -> Result<(), StoreError> {
        write_json(&self.noise_path, noise)
    }

    fn load_noise(&self) -> Result<NoiseMatrix, StoreError> {
        read_json(&self.noise_path)
    }

    fn save_permutation(&mut self, indices: &PermutationIndices) -> Result<(), StoreError> {
        write_json(&self.permutation_path, indices)
    }

    fn load_permutation(&self) -> Result<PermutationIndices, StoreError> {
        read_json(&self.permutation_path)
    }

    fn save_artifacts(
        &mut self,
        noise: &NoiseMatrix,
        indices: &PermutationIndices,
    ) -> Result<(), StoreError> {
        let staged_noise = stage_json(&self.noise_path, noise)?;
        let staged_permutation = stage_json(&self.permutation_path, indices)?;
        commit(staged_noise, &self.noise_path)?;
        commit(staged_permutation, &self.permutation_path)
    }
}

/// Keeps serialized JSON documents in memory; useful for tests and for
/// callers that ship the artifacts over their own channel.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    noise: Option<Vec<u8>>,
    permutation: Option<Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn noise_json(&self) -> Option<&[u8]> {
        self.noise.as_deref()
    }

    pub fn permutation_json(&self) -> Option<&[u8]> {
        self.permutation.as_deref()
    }
}

impl ArtifactStore for MemoryStore {
    fn save_noise(&mut self, noise: &NoiseMatrix) -> Result<(), StoreError> {
        self.noise = Some(serde_json::to_vec(noise)?);
        Ok(())
    }

    fn load_noise(&self) -> Result<NoiseMatrix, StoreError> {
        let bytes = self.noise.as_deref().ok_or(StoreError::Missing("noise"))?;
        Ok(serde_json::from_slice(bytes)?)
    }

    fn save_permutation(&mut self, indices: &PermutationIndices) -> Result<(), StoreError> {
        self.permutation = Some(serde_json::to_vec(indices)?);
        Ok(())
    }

    fn load_permutation(&self) -> Result<PermutationIndices, StoreError> {
        let bytes = self
            .permutation
            .as_deref()
            .ok_or(StoreError::Missing("permutation"))?;
        Ok(serde_json::from_slice(bytes)?)
    }

    fn save_artifacts(
        &mut self,
        noise: &NoiseMatrix,
        indices: &PermutationIndices,
    ) -> Result<(), StoreError> {
        let noise = serde_json::to_vec(noise)?;
        let permutation = serde_json::to_vec(indices)?;
        self.noise = Some(noise);
        self.permutation = Some(permutation);
        Ok(())
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Serializes `value` into a temporary file beside `path`.
fn stage_json<T: Serialize>(path: &Path, value: &T) -> Result<NamedTempFile, StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir).map_err(io_error(path))?;
    let mut writer = BufWriter::new(staged.as_file_mut());
    serde_json::to_writer(&mut writer, value)?;
    writer.write_all(b"\n").map_err(io_error(path))?;
    writer.flush().map_err(io_error(path))?;
    drop(writer);
    Ok(staged)
}

fn commit(staged: NamedTempFile, path: &Path) -> Result<(), StoreError> {
    staged.persist(path).map_err(|err| StoreError::Io {
        path: path.to_path_buf(),
        source: err.error,
    })?;
    debug!("wrote artifact {}", path.display());
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    commit(stage_json(path, value)?, path)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let file = File::open(path).map_err(io_error(path))?;
    let value = serde_json::from_reader(BufReader::new(file))?;
    debug!("read artifact {}", path.display());
    Ok(value)
}
