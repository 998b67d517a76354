//! Model Registry - versioned, immutable model artifacts
//!
//! Versions are numbered from 1 with no gaps. A committed version is never
//! rewritten. The "current" pointer lives in `current_version.txt` and is
//! re-read on every lookup, so a repoint is visible immediately.

pub mod artifact;

use chrono::{DateTime, Utc};
use lru::LruCache;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::evaluation::{self, MetricsReport, VersionComparison};
use crate::model::{self, LogisticRegression, TfidfVectorizer};
use crate::types::{Label, LabelSpace};
use artifact::{Artifact, MANIFEST_FILE};

const POINTER_FILE: &str = "current_version.txt";

/// A committed, immutable model
#[derive(Debug, Clone)]
pub struct ModelVersion {
    pub version: u32,
    pub vectorizer: TfidfVectorizer,
    pub classifier: LogisticRegression,
    pub label_space: LabelSpace,
    pub metrics: MetricsReport,
    pub created_at: DateTime<Utc>,
}

impl ModelVersion {
    /// Predicted label and its probability
    pub fn classify(&self, text: &str) -> Result<(Label, f64)> {
        let (label, confidence, _) =
            model::classify(&self.vectorizer, &self.classifier, &self.label_space, text)?;
        Ok((label, confidence))
    }

    /// Probability assigned to `label`, or 0 when the label is outside this model's space
    pub fn probability_of(&self, text: &str, label: Label) -> f64 {
        let proba = self.classifier.predict_proba(&self.vectorizer.transform(text));
        self.label_space
            .index_of(label)
            .and_then(|i| proba.get(i).copied())
            .unwrap_or(0.0)
    }
}

/// File-backed registry rooted at one directory
pub struct ModelRegistry {
    root: PathBuf,
    cache: Mutex<LruCache<u32, Arc<ModelVersion>>>,
    commit_lock: Mutex<()>,
}

impl ModelRegistry {
    /// Open (creating if needed) a registry under `root`
    pub fn open(root: impl AsRef<Path>, cache_capacity: usize) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| Error::storage(&root, e))?;
        let capacity = NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            root,
            cache: Mutex::new(LruCache::new(capacity)),
            commit_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist a new version numbered one past the highest existing one
    pub fn commit(
        &self,
        vectorizer: TfidfVectorizer,
        classifier: LogisticRegression,
        label_space: LabelSpace,
        metrics: MetricsReport,
    ) -> Result<Arc<ModelVersion>> {
        let _guard = self
            .commit_lock
            .lock()
            .map_err(|_| Error::storage(&self.root, "registry commit lock poisoned"))?;

        let existing = self.versions()?;
        let previous = existing.last().copied();
        let version = previous.map_or(1, |v| v + 1);
        let final_dir = self.version_dir(version);
        if final_dir.exists() {
            return Err(Error::storage(&final_dir, "version directory already exists"));
        }

        // Without a pointer "current" means "highest"; pin the previous
        // version so the new one is not served implicitly. This happens
        // before the rename so nothing fallible runs once `v{N}` exists.
        if let Some(previous) = previous {
            if !self.pointer_path().exists() {
                self.write_pointer(previous)?;
            }
        }

        let artifact = Artifact {
            version,
            vectorizer,
            classifier,
            label_space,
            created_at: Utc::now(),
        };

        let tmp_dir = self.root.join(format!(".tmp-v{}-{}", version, uuid::Uuid::new_v4()));
        fs::create_dir_all(&tmp_dir).map_err(|e| Error::storage(&tmp_dir, e))?;
        let written = artifact::write_bundle(&tmp_dir, &artifact, &metrics)
            .and_then(|_| fs::rename(&tmp_dir, &final_dir).map_err(|e| Error::storage(&final_dir, e)));
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_dir_all(&tmp_dir) {
                warn!("Failed to remove {}: {}", tmp_dir.display(), cleanup);
            }
            return Err(e);
        }

        info!("Committed model v{} ({} labels)", version, artifact.label_space.len());

        let model = Arc::new(ModelVersion {
            version,
            vectorizer: artifact.vectorizer,
            classifier: artifact.classifier,
            label_space: artifact.label_space,
            metrics,
            created_at: artifact.created_at,
        });
        self.cache_put(version, Arc::clone(&model));
        Ok(model)
    }

    /// Fetch `version`, or the current version when `None`
    pub fn get(&self, version: Option<u32>) -> Result<Arc<ModelVersion>> {
        let version = match version {
            Some(v) => v,
            None => self.current_version()?.ok_or(Error::ModelNotLoaded)?,
        };

        if let Some(hit) = self.cache_get(version) {
            return Ok(hit);
        }

        let dir = self.version_dir(version);
        if !dir.join(MANIFEST_FILE).exists() {
            return Err(Error::VersionNotFound(version));
        }
        let (artifact, metrics) = artifact::read_bundle(&dir, version)?;
        debug!("Loaded model v{} from {}", version, dir.display());

        let model = Arc::new(ModelVersion {
            version,
            vectorizer: artifact.vectorizer,
            classifier: artifact.classifier,
            label_space: artifact.label_space,
            metrics,
            created_at: artifact.created_at,
        });
        self.cache_put(version, Arc::clone(&model));
        Ok(model)
    }

    /// Metrics recorded for `version`, or for the current version
    pub fn metrics(&self, version: Option<u32>) -> Result<MetricsReport> {
        Ok(self.get(version)?.metrics.clone())
    }

    /// Repoint "current" at an existing version
    pub fn set_current(&self, version: u32) -> Result<()> {
        if !self.version_dir(version).join(MANIFEST_FILE).exists() {
            return Err(Error::VersionNotFound(version));
        }
        self.write_pointer(version)?;
        info!("Current model is now v{}", version);
        Ok(())
    }

    /// The version served by default, if any version exists
    pub fn current_version(&self) -> Result<Option<u32>> {
        let path = self.pointer_path();
        match fs::read_to_string(&path) {
            Ok(contents) => {
                let version = contents
                    .trim()
                    .parse::<u32>()
                    .map_err(|e| Error::storage(&path, e))?;
                Ok(Some(version))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => self.latest(),
            Err(e) => Err(Error::storage(&path, e)),
        }
    }

    /// All committed versions, ascending
    pub fn versions(&self) -> Result<Vec<u32>> {
        let entries = fs::read_dir(&self.root).map_err(|e| Error::storage(&self.root, e))?;
        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::storage(&self.root, e))?;
            let name = entry.file_name();
            let Some(number) = name.to_str().and_then(|n| n.strip_prefix('v')) else {
                continue;
            };
            if let Ok(v) = number.parse::<u32>() {
                if entry.path().join(MANIFEST_FILE).exists() {
                    versions.push(v);
                }
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    /// Highest committed version
    pub fn latest(&self) -> Result<Option<u32>> {
        Ok(self.versions()?.last().copied())
    }

    /// Headline metrics of each requested version, in the given order
    pub fn compare(&self, versions: &[u32]) -> Result<Vec<VersionComparison>> {
        let models = versions
            .iter()
            .map(|v| self.get(Some(*v)))
            .collect::<Result<Vec<_>>>()?;
        Ok(evaluation::compare(models.iter().map(|m| (m.version, &m.metrics))))
    }

    fn version_dir(&self, version: u32) -> PathBuf {
        self.root.join(format!("v{}", version))
    }

    fn pointer_path(&self) -> PathBuf {
        self.root.join(POINTER_FILE)
    }

    fn write_pointer(&self, version: u32) -> Result<()> {
        artifact::replace_atomic(&self.pointer_path(), version.to_string().as_bytes())
    }

    fn cache_get(&self, version: u32) -> Option<Arc<ModelVersion>> {
        self.cache.lock().ok()?.get(&version).cloned()
    }

    fn cache_put(&self, version: u32, model: Arc<ModelVersion>) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(version, model);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Trainer, TrainerParams, VectorizerParams};
    use crate::types::Example;

    fn trained() -> (TfidfVectorizer, LogisticRegression, MetricsReport) {
        let train = vec![
            Example::new("parliament votes on election law", Label::World),
            Example::new("striker scores in cup final", Label::Sports),
            Example::new("bank shares climb on profits", Label::Business),
            Example::new("new chip speeds up software", Label::SciTech),
        ];
        let params = TrainerParams {
            vectorizer: VectorizerParams { min_df: 1, max_df: 1.0, ..Default::default() },
            ..Default::default()
        };
        let (v, c) = Trainer::new(params).fit(&train, &LabelSpace::full()).unwrap();
        let metrics = evaluation::evaluate(&v, &c, &LabelSpace::full(), &train).unwrap();
        (v, c, metrics)
    }

    fn commit_one(registry: &ModelRegistry) -> Arc<ModelVersion> {
        let (v, c, m) = trained();
        registry.commit(v, c, LabelSpace::full(), m).unwrap()
    }

    #[test]
    fn test_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path(), 4).unwrap();
        assert!(registry.versions().unwrap().is_empty());
        assert_eq!(registry.current_version().unwrap(), None);
        assert_eq!(registry.get(None).unwrap_err().kind(), "model_not_loaded");
        assert_eq!(registry.get(Some(1)).unwrap_err().kind(), "version_not_found");
    }

    #[test]
    fn test_versions_are_contiguous() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path(), 4).unwrap();
        for expected in 1..=3 {
            assert_eq!(commit_one(&registry).version, expected);
        }
        assert_eq!(registry.versions().unwrap(), vec![1, 2, 3]);
        assert_eq!(registry.latest().unwrap(), Some(3));
    }

    #[test]
    fn test_commit_does_not_promote() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path(), 4).unwrap();
        commit_one(&registry);
        assert_eq!(registry.current_version().unwrap(), Some(1));
        commit_one(&registry);
        assert_eq!(registry.current_version().unwrap(), Some(1));

        registry.set_current(2).unwrap();
        assert_eq!(registry.get(None).unwrap().version, 2);
        assert_eq!(registry.set_current(9).unwrap_err().kind(), "version_not_found");
        assert_eq!(registry.current_version().unwrap(), Some(2));
    }

    #[test]
    fn test_reload_from_disk_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let committed = {
            let registry = ModelRegistry::open(dir.path(), 4).unwrap();
            commit_one(&registry)
        };
        let registry = ModelRegistry::open(dir.path(), 4).unwrap();
        let loaded = registry.get(Some(1)).unwrap();
        assert_eq!(loaded.vectorizer, committed.vectorizer);
        assert_eq!(loaded.classifier, committed.classifier);
        assert_eq!(loaded.metrics, committed.metrics);
        assert_eq!(loaded.created_at, committed.created_at);
    }

    #[test]
    fn test_tampered_artifact_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        {
            let registry = ModelRegistry::open(dir.path(), 4).unwrap();
            commit_one(&registry);
        }
        let metrics_path = dir.path().join("v1").join(artifact::METRICS_FILE);
        let mut text = fs::read_to_string(&metrics_path).unwrap();
        text.push(' ');
        fs::write(&metrics_path, text).unwrap();

        let registry = ModelRegistry::open(dir.path(), 4).unwrap();
        assert_eq!(registry.get(Some(1)).unwrap_err().kind(), "corrupted_artifact");
    }

    #[test]
    fn test_compare_reports_each_version() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path(), 1).unwrap();
        commit_one(&registry);
        commit_one(&registry);
        let rows = registry.compare(&[2, 1]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].version, 2);
        assert_eq!(registry.compare(&[1, 7]).unwrap_err().kind(), "version_not_found");
    }

    #[test]
    fn test_failed_pointer_write_commits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path(), 4).unwrap();
        // A directory where the pointer's temp file goes makes every pointer write fail
        fs::create_dir_all(dir.path().join("current_version.tmp")).unwrap();

        // The first version needs no pointer
        assert_eq!(commit_one(&registry).version, 1);
        assert_eq!(registry.current_version().unwrap(), Some(1));

        let (v, c, m) = trained();
        let err = registry.commit(v, c, LabelSpace::full(), m).unwrap_err();
        assert_eq!(err.kind(), "storage_error");
        assert_eq!(registry.versions().unwrap(), vec![1]);
        assert!(!dir.path().join("v2").exists());
        assert_eq!(registry.current_version().unwrap(), Some(1));

        fs::remove_dir(dir.path().join("current_version.tmp")).unwrap();
        assert_eq!(commit_one(&registry).version, 2);
        assert_eq!(registry.current_version().unwrap(), Some(1));
    }

    #[test]
    fn test_stray_temp_dirs_are_not_versions() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path(), 4).unwrap();
        fs::create_dir_all(dir.path().join(".tmp-v1-abc")).unwrap();
        fs::create_dir_all(dir.path().join("v5")).unwrap();
        assert!(registry.versions().unwrap().is_empty());
        assert_eq!(commit_one(&registry).version, 1);
    }
}
