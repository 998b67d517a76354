//! HumanLoop - human-in-the-loop text classification library
//!
//! A model serves predictions, users submit corrections, and a retraining
//! run folds those corrections back into a new model version:
//! - Feedback store: append-only log of human corrections (JSON lines or SQLite)
//! - Trainer: TF-IDF features and weighted multinomial logistic regression
//! - Evaluator: accuracy, macro/weighted F1, per-class metrics, confusion matrix
//! - Model registry: immutable numbered versions with an explicit current pointer
//! - Retraining orchestrator: all-or-nothing runs, one at a time
//! - Prediction service and HTTP surface
//!
//! # Example
//!
//! ```ignore
//! use humanloop::{App, Config};
//!
//! let app = App::open(&Config::load()?)?;
//! app.orchestrator.run_baseline()?;
//! let prediction = app.predictor.predict("Stocks rally as rates fall")?;
//! println!("{} ({:.2})", prediction.label, prediction.confidence);
//! ```

// Core modules (order matters for cross-module dependencies)
pub mod error;
pub mod types;
pub mod corpus;
pub mod feedback;
pub mod model;
pub mod evaluation;
pub mod registry;
pub mod prediction;
pub mod orchestrator;

// Application edges
pub mod config;
pub mod app;
pub mod server;
pub mod cli;

pub use app::App;
pub use config::Config;
pub use error::{Error, Result};
pub use evaluation::MetricsReport;
pub use feedback::{FeedbackRecord, FeedbackStore};
pub use orchestrator::{Orchestrator, RunReport, RunState};
pub use prediction::{Prediction, PredictionService};
pub use registry::{ModelRegistry, ModelVersion};
pub use types::{Example, Label, LabelSpace};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
