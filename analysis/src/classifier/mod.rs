//! Classifiers over the fixed diagnostic classes

pub mod cnn;
pub mod simulated;

use std::sync::Arc;

use crate::error::Result;
use crate::imaging::ImageTensor;
use shared::{ClassProbabilities, ClassifierBackend};

pub use cnn::{CnnClassifier, CnnWeights};
pub use simulated::SimulatedClassifier;

/// Anything that turns a preprocessed image into class probabilities
pub trait Classifier: Send + Sync {
    fn backend(&self) -> ClassifierBackend;

    /// Edge length of the square input tensor
    fn input_size(&self) -> u32;

    fn classify(&self, input: &ImageTensor) -> Result<ClassProbabilities>;
}

/// One classifier per backend, picked per request
#[derive(Clone)]
pub struct ClassifierSet {
    model: Arc<dyn Classifier>,
    simulated: Arc<dyn Classifier>,
}

impl ClassifierSet {
    pub fn new(model: Arc<dyn Classifier>, simulated: Arc<dyn Classifier>) -> Self {
        Self { model, simulated }
    }

    pub fn get(&self, backend: ClassifierBackend) -> &Arc<dyn Classifier> {
        match backend {
            ClassifierBackend::Model => &self.model,
            ClassifierBackend::Simulated => &self.simulated,
        }
    }
}
