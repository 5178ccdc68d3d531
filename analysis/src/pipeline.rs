//! Analysis modes: single image, batch and technique comparison

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::classifier::cnn::DEFAULT_WEIGHT_SEED;
use crate::classifier::{ClassifierSet, CnnClassifier, SimulatedClassifier};
use crate::error::{AnalysisError, Result};
use crate::imaging::{self, ClaheParams, DEFAULT_INPUT_SIZE, DecodedImage, FilterSet};
use shared::{
    AnalysisFailure, AnalysisResult, BatchReport, ClassifierBackend, PatientId, ProcessId, TechniqueComparison,
    process_debug, process_info, process_warn,
};

/// Engine construction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Edge length the classifier input is resized to
    pub input_size: u32,
    /// Seed for the simulated classifier; `None` draws from OS entropy
    pub seed: Option<u64>,
    /// Seed for the placeholder network's weights
    pub weight_seed: u64,
    /// Optional JSON weights for the placeholder network
    pub weights_path: Option<PathBuf>,
    pub clahe: ClaheParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            seed: None,
            weight_seed: DEFAULT_WEIGHT_SEED,
            weights_path: None,
            clahe: ClaheParams::default(),
        }
    }
}

/// Per-request analysis options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisOptions {
    pub enhance: bool,
    pub backend: ClassifierBackend,
    pub patient_id: Option<PatientId>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            enhance: true,
            backend: ClassifierBackend::default(),
            patient_id: None,
        }
    }
}

/// A file handed in for analysis
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

/// Image pipeline plus classifiers
#[derive(Clone)]
pub struct AnalysisEngine {
    classifiers: ClassifierSet,
    clahe: ClaheParams,
}

impl AnalysisEngine {
    pub fn new(classifiers: ClassifierSet, clahe: ClaheParams) -> Self {
        Self { classifiers, clahe }
    }

    /// Build both classifiers from configuration
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        config.clahe.validate()?;

        let model = CnnClassifier::load_or_seeded(config.weights_path.as_deref(), config.input_size, config.weight_seed)?;
        let simulated = SimulatedClassifier::new(config.seed).with_input_size(config.input_size);

        process_info!(
            ProcessId::current(),
            "🧠 Analysis engine ready (model input {}px, simulated seed {:?})",
            crate::classifier::Classifier::input_size(&model),
            config.seed
        );

        Ok(Self::new(
            ClassifierSet::new(Arc::new(model), Arc::new(simulated)),
            config.clahe,
        ))
    }

    pub fn classifiers(&self) -> &ClassifierSet {
        &self.classifiers
    }

    fn classify_decoded(
        &self,
        decoded: &DecodedImage,
        file_name: &str,
        enhance: bool,
        backend: ClassifierBackend,
    ) -> Result<AnalysisResult> {
        let classifier = self.classifiers.get(backend);

        let tensor = if enhance {
            let enhanced = imaging::clahe::enhance_with(&decoded.rgb, self.clahe);
            imaging::preprocess(&enhanced, classifier.input_size())
        } else {
            imaging::preprocess(&decoded.rgb, classifier.input_size())
        };

        let probabilities = classifier.classify(&tensor)?;
        Ok(AnalysisResult::new(
            file_name,
            decoded.info.clone(),
            backend,
            enhance,
            probabilities,
        ))
    }

    /// Decode, optionally enhance, preprocess and classify one image
    pub fn analyze(&self, bytes: &[u8], file_name: &str, options: AnalysisOptions) -> Result<AnalysisResult> {
        let decoded = imaging::decode(bytes, file_name)?;
        let result = self
            .classify_decoded(&decoded, file_name, options.enhance, options.backend)?
            .with_patient(options.patient_id);

        process_debug!(
            ProcessId::current(),
            "🔬 {} -> {} ({:.1}%) via {}",
            file_name,
            result.predicted,
            result.confidence * 100.0,
            options.backend
        );
        Ok(result)
    }

    /// Analyse every image (always enhanced). Bad files become failures in the
    /// report rather than aborting the batch. `progress` is called with
    /// `(done, total)` after each item.
    pub fn analyze_batch<F>(
        &self,
        items: &[UploadedImage],
        backend: ClassifierBackend,
        mut progress: F,
    ) -> Result<BatchReport>
    where
        F: FnMut(usize, usize),
    {
        if items.is_empty() {
            return Err(AnalysisError::EmptyBatch);
        }

        let batch_id = Uuid::new_v4();
        let total = items.len();
        let options = AnalysisOptions {
            enhance: true,
            backend,
            patient_id: None,
        };

        let mut results = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for (i, item) in items.iter().enumerate() {
            match self.analyze(&item.bytes, &item.file_name, options) {
                Ok(result) => results.push(result),
                Err(e) => {
                    process_warn!(ProcessId::current(), "⚠️ Batch {} skipped {}: {}", batch_id, item.file_name, e);
                    failures.push(AnalysisFailure {
                        file_name: item.file_name.clone(),
                        message: e.to_string(),
                    });
                }
            }
            progress(i + 1, total);
        }

        process_info!(
            ProcessId::current(),
            "📁 Batch {} finished: {} analysed, {} failed",
            batch_id,
            results.len(),
            failures.len()
        );
        Ok(BatchReport::new(batch_id, backend, results, failures))
    }

    /// Classify the same image raw and enhanced
    pub fn compare(&self, bytes: &[u8], file_name: &str, backend: ClassifierBackend) -> Result<TechniqueComparison> {
        let decoded = imaging::decode(bytes, file_name)?;
        let original = self.classify_decoded(&decoded, file_name, false, backend)?;
        let enhanced = self.classify_decoded(&decoded, file_name, true, backend)?;
        Ok(TechniqueComparison::new(original, enhanced))
    }

    /// Processing variants of an image, optionally after enhancement
    pub fn filters(&self, bytes: &[u8], file_name: &str, enhance: bool) -> Result<FilterSet> {
        let decoded = imaging::decode(bytes, file_name)?;
        let base = if enhance {
            imaging::clahe::enhance_with(&decoded.rgb, self.clahe)
        } else {
            decoded.rgb
        };
        Ok(imaging::apply_filters(&base))
    }
}
