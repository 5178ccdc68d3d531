//! Randomized stand-in classifier
//!
//! Draws one uniform value per class and normalizes the draw. The image is
//! never looked at.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

use super::Classifier;
use crate::error::{AnalysisError, Result};
use crate::imaging::{DEFAULT_INPUT_SIZE, ImageTensor};
use shared::{ClassProbabilities, ClassifierBackend, DiagnosticClass};

pub struct SimulatedClassifier {
    rng: Mutex<StdRng>,
    input_size: u32,
}

impl SimulatedClassifier {
    /// Seeded for reproducible sequences, otherwise seeded from OS entropy
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
            input_size: DEFAULT_INPUT_SIZE,
        }
    }

    pub fn with_input_size(mut self, input_size: u32) -> Self {
        self.input_size = input_size;
        self
    }

    fn draw(&self) -> Result<[f64; DiagnosticClass::COUNT]> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| AnalysisError::InvalidConfig("simulated classifier RNG poisoned".to_string()))?;
        let mut scores = [0.0; DiagnosticClass::COUNT];
        for score in scores.iter_mut() {
            *score = rng.r#gen::<f64>();
        }
        Ok(scores)
    }
}

impl Classifier for SimulatedClassifier {
    fn backend(&self) -> ClassifierBackend {
        ClassifierBackend::Simulated
    }

    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn classify(&self, _input: &ImageTensor) -> Result<ClassProbabilities> {
        let scores = self.draw()?;
        Ok(ClassProbabilities::from_scores(&scores)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn blank() -> ImageTensor {
        Array3::zeros((4, 4, 3))
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let classifier = SimulatedClassifier::new(None);
        for _ in 0..50 {
            let p = classifier.classify(&blank()).unwrap();
            let total: f64 = p.as_slice().iter().sum();
            assert!((total - 1.0).abs() < 1e-9);
            assert!(p.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_seeded_runs_repeat() {
        let a = SimulatedClassifier::new(Some(42));
        let b = SimulatedClassifier::new(Some(42));
        for _ in 0..5 {
            assert_eq!(a.classify(&blank()).unwrap(), b.classify(&blank()).unwrap());
        }
    }

    #[test]
    fn test_successive_draws_differ() {
        let classifier = SimulatedClassifier::new(Some(7));
        let first = classifier.classify(&blank()).unwrap();
        let second = classifier.classify(&blank()).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_backend_tag() {
        assert_eq!(SimulatedClassifier::new(None).backend(), ClassifierBackend::Simulated);
    }
}
