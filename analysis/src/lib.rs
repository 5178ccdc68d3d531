//! Image analysis engine for colposcopy triage
//!
//! Decodes uploads, enhances and filters them, and runs one of the
//! classifiers over the fixed diagnostic classes. Everything here is
//! synchronous and CPU bound; async callers should run it on a blocking pool.

pub mod classifier;
pub mod error;
pub mod imaging;
pub mod pipeline;

pub use classifier::{Classifier, ClassifierSet, CnnClassifier, CnnWeights, SimulatedClassifier};
pub use error::{AnalysisError, Result};
pub use imaging::{ClaheParams, DecodedImage, FilterKind, FilterSet, ImageTensor};
pub use pipeline::{AnalysisEngine, AnalysisOptions, EngineConfig, UploadedImage};
