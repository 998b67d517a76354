//! End-to-end tests for the feedback-driven retraining pipeline

use std::sync::{Arc, Barrier};
use std::thread;

use humanloop::corpus::{CorpusLoader, InMemoryCorpus};
use humanloop::feedback::{FeedbackRecord, FeedbackStore, JsonlFeedbackStore, SqliteFeedbackStore};
use humanloop::model::{Trainer, TrainerParams};
use humanloop::orchestrator::{Orchestrator, RetrainOptions, RunState};
use humanloop::{Error, Example, Label, ModelRegistry};
use tempfile::TempDir;

const TOPICS: [(Label, [&str; 8]); 4] = [
    (
        Label::World,
        ["parliament", "election", "minister", "embassy", "treaty", "border", "president", "refugees"],
    ),
    (
        Label::Sports,
        ["striker", "goalkeeper", "tournament", "coach", "championship", "league", "penalty", "stadium"],
    ),
    (
        Label::Business,
        ["shares", "profit", "merger", "investors", "earnings", "revenue", "stocks", "bank"],
    ),
    (
        Label::SciTech,
        ["software", "chip", "satellite", "research", "internet", "processor", "scientists", "browser"],
    ),
];

/// 100 examples, 25 per label
fn base_corpus() -> Vec<Example> {
    let mut out = Vec::new();
    for i in 0..25 {
        for (label, words) in &TOPICS {
            let text = format!(
                "{} {} {} news today",
                words[i % 8],
                words[(i * 3 + 1) % 8],
                words[(i * 5 + 2) % 8]
            );
            out.push(Example::new(text, *label));
        }
    }
    out
}

struct Harness {
    _dir: TempDir,
    feedback: Arc<dyn FeedbackStore>,
    registry: Arc<ModelRegistry>,
    orchestrator: Orchestrator,
}

fn harness_with(corpus: Arc<dyn CorpusLoader>, options: RetrainOptions) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let feedback: Arc<dyn FeedbackStore> =
        Arc::new(JsonlFeedbackStore::open(dir.path().join("feedback")).unwrap());
    let registry = Arc::new(ModelRegistry::open(dir.path().join("models"), 4).unwrap());
    let orchestrator = Orchestrator::new(
        corpus,
        Arc::clone(&feedback),
        Arc::clone(&registry),
        Trainer::new(TrainerParams::default()),
        options,
    );
    Harness {
        _dir: dir,
        feedback,
        registry,
        orchestrator,
    }
}

fn harness() -> Harness {
    harness_with(Arc::new(InMemoryCorpus::new(base_corpus())), RetrainOptions::default())
}

#[test]
fn test_version_numbers_are_contiguous() {
    let h = harness();
    assert_eq!(h.orchestrator.run_baseline().unwrap().version, 1);
    for expected in 2..=4 {
        let report = h.orchestrator.retrain(None).unwrap();
        assert_eq!(report.version, expected);
    }
    assert_eq!(h.registry.versions().unwrap(), vec![1, 2, 3, 4]);
}

#[test]
fn test_committed_versions_are_immutable() {
    let h = harness();
    h.orchestrator.run_baseline().unwrap();
    let v1_dir = h.registry.root().join("v1");
    let bytes_before: Vec<Vec<u8>> = ["artifact.json", "metrics.json", "manifest.json"]
        .iter()
        .map(|f| std::fs::read(v1_dir.join(f)).unwrap())
        .collect();
    let before = h.registry.get(Some(1)).unwrap();

    h.feedback
        .append(&FeedbackRecord::new("stadium merger talks", Label::Sports, Label::Business, 1))
        .unwrap();
    h.orchestrator.retrain(Some(2.0)).unwrap();

    let bytes_after: Vec<Vec<u8>> = ["artifact.json", "metrics.json", "manifest.json"]
        .iter()
        .map(|f| std::fs::read(v1_dir.join(f)).unwrap())
        .collect();
    assert_eq!(bytes_before, bytes_after);

    // A fresh registry bypasses the in-memory cache
    let reopened = ModelRegistry::open(h.registry.root(), 1).unwrap();
    let after = reopened.get(Some(1)).unwrap();
    assert_eq!(before.vectorizer, after.vectorizer);
    assert_eq!(before.classifier, after.classifier);
    assert_eq!(before.metrics, after.metrics);
}

#[test]
fn test_insufficient_data_leaves_registry_untouched() {
    let mut corpus = base_corpus();
    corpus.retain(|e| e.label != Label::SciTech);
    let h = harness_with(Arc::new(InMemoryCorpus::new(corpus)), RetrainOptions::default());

    let err = h.orchestrator.run_baseline().unwrap_err();
    match err {
        Error::InsufficientData { missing } => assert_eq!(missing, vec![Label::SciTech]),
        other => panic!("unexpected error: {other}"),
    }
    assert!(h.registry.versions().unwrap().is_empty());
    assert_eq!(h.registry.current_version().unwrap(), None);
}

struct BrokenFeedback;

impl FeedbackStore for BrokenFeedback {
    fn append(&self, _record: &FeedbackRecord) -> humanloop::Result<()> {
        Err(Error::storage("/unavailable/feedback.jsonl", "device not ready"))
    }

    fn load_all(&self) -> humanloop::Result<Vec<FeedbackRecord>> {
        Err(Error::storage("/unavailable/feedback.jsonl", "device not ready"))
    }
}

#[test]
fn test_storage_failure_leaves_registry_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ModelRegistry::open(dir.path(), 4).unwrap());
    let orchestrator = Orchestrator::new(
        Arc::new(InMemoryCorpus::new(base_corpus())),
        Arc::new(BrokenFeedback),
        Arc::clone(&registry),
        Trainer::new(TrainerParams::default()),
        RetrainOptions::default(),
    );

    // Baseline does not read feedback
    orchestrator.run_baseline().unwrap();
    let err = orchestrator.retrain(None).unwrap_err();
    assert_eq!(err.kind(), "storage_error");
    assert_eq!(registry.versions().unwrap(), vec![1]);
    assert!(matches!(
        orchestrator.state(),
        RunState::Failed { ref kind, .. } if kind == "storage_error"
    ));
}

#[test]
fn test_pointer_write_failure_commits_no_version() {
    let h = harness();
    // Leaves the pointer unwritable; the first commit does not need it
    std::fs::create_dir_all(h.registry.root().join("current_version.tmp")).unwrap();
    assert_eq!(h.orchestrator.run_baseline().unwrap().version, 1);

    let err = h.orchestrator.retrain(None).unwrap_err();
    assert_eq!(err.kind(), "storage_error");
    assert_eq!(h.registry.versions().unwrap(), vec![1]);
    assert!(!h.registry.root().join("v2").exists());
    assert_eq!(h.registry.current_version().unwrap(), Some(1));
    assert!(matches!(
        h.orchestrator.state(),
        RunState::Failed { ref kind, .. } if kind == "storage_error"
    ));
}

#[test]
fn test_retraining_without_feedback_is_reproducible() {
    let h = harness();
    h.orchestrator.run_baseline().unwrap();
    let second = h.orchestrator.retrain(None).unwrap();
    let third = h.orchestrator.retrain(None).unwrap();

    assert_eq!(second.version, 2);
    assert_eq!(second.counts.held_out, 20);
    assert_eq!(second.metrics, third.metrics);
    assert_eq!(second.metrics.accuracy.to_bits(), third.metrics.accuracy.to_bits());

    let v2 = h.registry.get(Some(2)).unwrap();
    let v3 = h.registry.get(Some(3)).unwrap();
    assert_eq!(v2.classifier, v3.classifier);
}

#[test]
fn test_higher_feedback_weight_raises_human_label_probability() {
    let text = "striker coach penalty stadium";
    let h = harness();
    h.orchestrator.run_baseline().unwrap();
    h.feedback
        .append(&FeedbackRecord::new(text, Label::Sports, Label::Business, 1))
        .unwrap();

    let light = h.orchestrator.retrain(Some(1.0)).unwrap();
    let heavy = h.orchestrator.retrain(Some(2.0)).unwrap();

    let p_light = h.registry.get(Some(light.version)).unwrap().probability_of(text, Label::Business);
    let p_heavy = h.registry.get(Some(heavy.version)).unwrap().probability_of(text, Label::Business);
    assert!(p_heavy >= p_light, "{p_heavy} < {p_light}");
}

#[test]
fn test_weighted_feedback_flips_prediction() {
    let text = "investors see profit as striker signs";
    let h = harness();
    h.orchestrator.run_baseline().unwrap();
    h.feedback
        .append(&FeedbackRecord::new(text, Label::Sports, Label::Business, 1))
        .unwrap();

    let at_one = h.orchestrator.retrain(Some(1.0)).unwrap();
    let at_three = h.orchestrator.retrain(Some(3.0)).unwrap();

    let model_one = h.registry.get(Some(at_one.version)).unwrap();
    let model_three = h.registry.get(Some(at_three.version)).unwrap();
    let (label, confidence) = model_three.classify(text).unwrap();
    assert_eq!(label, Label::Business);
    assert!(confidence > model_one.probability_of(text, Label::Business));
}

#[test]
fn test_new_versions_are_not_served_until_promoted() {
    let h = harness();
    h.orchestrator.run_baseline().unwrap();
    let report = h.orchestrator.retrain(None).unwrap();
    assert!(!report.promoted);
    assert_eq!(h.registry.current_version().unwrap(), Some(1));
    assert_eq!(h.registry.get(None).unwrap().version, 1);

    h.registry.set_current(report.version).unwrap();
    assert_eq!(h.registry.get(None).unwrap().version, 2);
}

#[test]
fn test_unknown_metrics_version_has_no_fallback() {
    let h = harness();
    h.orchestrator.run_baseline().unwrap();
    h.orchestrator.retrain(None).unwrap();
    let err = h.registry.metrics(Some(99)).unwrap_err();
    assert!(matches!(err, Error::VersionNotFound(99)));
}

/// Blocks inside `load` until the test releases it
struct GatedCorpus {
    examples: Vec<Example>,
    gate: Arc<Barrier>,
}

impl CorpusLoader for GatedCorpus {
    fn load(&self) -> humanloop::Result<Vec<Example>> {
        self.gate.wait();
        self.gate.wait();
        Ok(self.examples.clone())
    }
}

#[test]
fn test_only_one_run_at_a_time() {
    let gate = Arc::new(Barrier::new(2));
    let corpus = GatedCorpus {
        examples: base_corpus(),
        gate: Arc::clone(&gate),
    };
    let h = Arc::new(harness_with(Arc::new(corpus), RetrainOptions::default()));

    let runner = {
        let h = Arc::clone(&h);
        thread::spawn(move || h.orchestrator.run_baseline().map(|r| r.version))
    };

    // First run is now inside corpus loading
    gate.wait();
    assert!(matches!(h.orchestrator.state(), RunState::Running { .. }));
    let err = h.orchestrator.run_baseline().unwrap_err();
    assert!(matches!(err, Error::RetrainInProgress));
    gate.wait();

    assert_eq!(runner.join().unwrap().unwrap(), 1);
    assert_eq!(h.registry.versions().unwrap(), vec![1]);
}

#[test]
fn test_sqlite_feedback_backend_feeds_retraining() {
    let dir = tempfile::tempdir().unwrap();
    let feedback: Arc<dyn FeedbackStore> =
        Arc::new(SqliteFeedbackStore::open(dir.path().join("feedback")).unwrap());
    let registry = Arc::new(ModelRegistry::open(dir.path().join("models"), 4).unwrap());
    let orchestrator = Orchestrator::new(
        Arc::new(InMemoryCorpus::new(base_corpus())),
        Arc::clone(&feedback),
        Arc::clone(&registry),
        Trainer::new(TrainerParams::default()),
        RetrainOptions::default(),
    );

    orchestrator.run_baseline().unwrap();
    feedback
        .append(&FeedbackRecord::new("browser chip earnings", Label::SciTech, Label::Business, 1))
        .unwrap();
    feedback
        .append(&FeedbackRecord::new("league stadium news", Label::Sports, Label::Sports, 1))
        .unwrap();

    let report = orchestrator.retrain(None).unwrap();
    assert_eq!(report.counts.feedback, 2);
    assert_eq!(report.counts.corrections, 1);
    assert_eq!(report.counts.training, 82);
}
