//! On-disk artifact bundle for one model version
//!
//! Layout of `v{N}/`:
//!   artifact.json  - vectorizer, classifier, label space, creation time
//!   metrics.json   - held-out MetricsReport
//!   manifest.json  - SHA-256 of both payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};
use crate::evaluation::MetricsReport;
use crate::model::{LogisticRegression, TfidfVectorizer};
use crate::types::LabelSpace;

pub const ARTIFACT_FILE: &str = "artifact.json";
pub const METRICS_FILE: &str = "metrics.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Serialized model state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub version: u32,
    pub vectorizer: TfidfVectorizer,
    pub classifier: LogisticRegression,
    pub label_space: LabelSpace,
    pub created_at: DateTime<Utc>,
}

/// Checksums recorded at commit time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub artifact_sha256: String,
    pub metrics_sha256: String,
    pub created_at: DateTime<Utc>,
}

pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Write every file of a bundle into `dir`, which must already exist
pub fn write_bundle(dir: &Path, artifact: &Artifact, metrics: &MetricsReport) -> Result<Manifest> {
    let artifact_bytes = to_json(dir, artifact)?;
    let metrics_bytes = to_json(dir, metrics)?;

    let manifest = Manifest {
        version: artifact.version,
        artifact_sha256: checksum(&artifact_bytes),
        metrics_sha256: checksum(&metrics_bytes),
        created_at: artifact.created_at,
    };
    let manifest_bytes = to_json(dir, &manifest)?;

    write_synced(&dir.join(ARTIFACT_FILE), &artifact_bytes)?;
    write_synced(&dir.join(METRICS_FILE), &metrics_bytes)?;
    write_synced(&dir.join(MANIFEST_FILE), &manifest_bytes)?;
    Ok(manifest)
}

/// Load and verify a committed bundle
pub fn read_bundle(dir: &Path, version: u32) -> Result<(Artifact, MetricsReport)> {
    let manifest: Manifest = from_json(&dir.join(MANIFEST_FILE), &read(&dir.join(MANIFEST_FILE))?)?;

    let artifact_path = dir.join(ARTIFACT_FILE);
    let artifact_bytes = read(&artifact_path)?;
    verify(version, &manifest.artifact_sha256, &artifact_bytes)?;

    let metrics_path = dir.join(METRICS_FILE);
    let metrics_bytes = read(&metrics_path)?;
    verify(version, &manifest.metrics_sha256, &metrics_bytes)?;

    let artifact: Artifact = from_json(&artifact_path, &artifact_bytes)?;
    if artifact.version != version {
        return Err(Error::storage(
            &artifact_path,
            format!("bundle claims version {} but lives in v{}", artifact.version, version),
        ));
    }
    let metrics: MetricsReport = from_json(&metrics_path, &metrics_bytes)?;
    Ok((artifact, metrics))
}

/// Replace `path` atomically with `contents`
pub fn replace_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    write_synced(&tmp, contents)?;
    fs::rename(&tmp, path).map_err(|e| Error::storage(path, e))
}

fn verify(version: u32, expected: &str, bytes: &[u8]) -> Result<()> {
    let actual = checksum(bytes);
    if actual != expected {
        return Err(Error::Corrupted {
            version,
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

fn write_synced(path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path).map_err(|e| Error::storage(path, e))?;
    file.write_all(contents).map_err(|e| Error::storage(path, e))?;
    file.sync_all().map_err(|e| Error::storage(path, e))
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::storage(path, e))
}

fn to_json<T: Serialize>(dir: &Path, value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|e| Error::storage(dir, e))
}

fn from_json<T: serde::de::DeserializeOwned>(path: &Path, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| Error::storage(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_hex_sha256() {
        assert_eq!(
            checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_replace_atomic_overwrites_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("current_version.txt");
        replace_atomic(&path, b"1").unwrap();
        replace_atomic(&path, b"2").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "2");
        assert!(!path.with_extension("tmp").exists());
    }
}
