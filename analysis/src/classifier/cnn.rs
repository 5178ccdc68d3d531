//! Placeholder convolutional network
//!
//! Three valid 3×3 convolutions with ReLU (the first two followed by 2×2 max
//! pooling), global average pooling, a hidden dense layer and a softmax head
//! over the diagnostic classes. Weights are Glorot-uniform from a seeded RNG
//! unless a weights file is supplied. The network is untrained; its output is
//! deterministic for a given seed and image but carries no clinical meaning.

use ndarray::{Array1, Array2, Array3, Array4, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::Classifier;
use crate::error::{AnalysisError, Result};
use crate::imaging::ImageTensor;
use shared::{ClassProbabilities, ClassifierBackend, DiagnosticClass, ProcessId, process_warn};

/// Channels after each convolution, starting with RGB input
const CHANNELS: [usize; 4] = [3, 8, 16, 32];
const HIDDEN: usize = 32;
const KERNEL: usize = 3;

/// Smallest input that still leaves one activation after the last convolution
pub const MIN_INPUT_SIZE: u32 = 20;

/// Default seed for the weight template
pub const DEFAULT_WEIGHT_SEED: u64 = 0x00C0_1F05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvWeights {
    pub in_channels: usize,
    pub out_channels: usize,
    /// Row-major `(out, in, 3, 3)`
    pub kernel: Vec<f32>,
    pub bias: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseWeights {
    pub inputs: usize,
    pub outputs: usize,
    /// Row-major `(outputs, inputs)`
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
}

/// Serializable weights for the whole network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CnnWeights {
    pub input_size: u32,
    pub conv: Vec<ConvWeights>,
    pub dense: Vec<DenseWeights>,
}

impl CnnWeights {
    /// Untrained template with Glorot-uniform weights and zero biases
    pub fn seeded(input_size: u32, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);

        let conv = CHANNELS
            .windows(2)
            .map(|pair| {
                let (cin, cout) = (pair[0], pair[1]);
                let fan_in = cin * KERNEL * KERNEL;
                let fan_out = cout * KERNEL * KERNEL;
                ConvWeights {
                    in_channels: cin,
                    out_channels: cout,
                    kernel: glorot(&mut rng, fan_in, fan_out, cout * fan_in),
                    bias: vec![0.0; cout],
                }
            })
            .collect();

        let last = CHANNELS[CHANNELS.len() - 1];
        let dense = [(last, HIDDEN), (HIDDEN, DiagnosticClass::COUNT)]
            .into_iter()
            .map(|(inputs, outputs)| DenseWeights {
                inputs,
                outputs,
                weights: glorot(&mut rng, inputs, outputs, inputs * outputs),
                bias: vec![0.0; outputs],
            })
            .collect();

        Self { input_size, conv, dense }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let weights: CnnWeights = serde_json::from_str(&content)?;
        weights.validate()?;
        Ok(weights)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check that the layer shapes chain into the fixed architecture
    pub fn validate(&self) -> Result<()> {
        if self.input_size < MIN_INPUT_SIZE {
            return Err(AnalysisError::InvalidWeights(format!(
                "input_size {} is below the minimum of {}",
                self.input_size, MIN_INPUT_SIZE
            )));
        }
        if self.conv.len() != CHANNELS.len() - 1 || self.dense.len() != 2 {
            return Err(AnalysisError::InvalidWeights(format!(
                "expected {} conv and 2 dense layers, got {} and {}",
                CHANNELS.len() - 1,
                self.conv.len(),
                self.dense.len()
            )));
        }

        for (i, layer) in self.conv.iter().enumerate() {
            let (cin, cout) = (CHANNELS[i], CHANNELS[i + 1]);
            if layer.in_channels != cin
                || layer.out_channels != cout
                || layer.kernel.len() != cout * cin * KERNEL * KERNEL
                || layer.bias.len() != cout
            {
                return Err(AnalysisError::InvalidWeights(format!("conv layer {i} has the wrong shape")));
            }
        }

        let expected = [
            (CHANNELS[CHANNELS.len() - 1], HIDDEN),
            (HIDDEN, DiagnosticClass::COUNT),
        ];
        for (i, (layer, (inputs, outputs))) in self.dense.iter().zip(expected).enumerate() {
            if layer.inputs != inputs
                || layer.outputs != outputs
                || layer.weights.len() != inputs * outputs
                || layer.bias.len() != outputs
            {
                return Err(AnalysisError::InvalidWeights(format!("dense layer {i} has the wrong shape")));
            }
        }

        let all_finite = self
            .conv
            .iter()
            .flat_map(|l| l.kernel.iter().chain(&l.bias))
            .chain(self.dense.iter().flat_map(|l| l.weights.iter().chain(&l.bias)))
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(AnalysisError::InvalidWeights("non-finite weight".to_string()));
        }

        Ok(())
    }
}

fn glorot(rng: &mut StdRng, fan_in: usize, fan_out: usize, count: usize) -> Vec<f32> {
    let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
    (0..count).map(|_| rng.gen_range(-limit..limit)).collect()
}

struct ConvLayer {
    kernel: Array4<f32>,
    bias: Array1<f32>,
}

struct DenseLayer {
    weights: Array2<f32>,
    bias: Array1<f32>,
}

pub struct CnnClassifier {
    input_size: u32,
    conv: Vec<ConvLayer>,
    dense: Vec<DenseLayer>,
}

impl CnnClassifier {
    pub fn from_weights(weights: CnnWeights) -> Result<Self> {
        weights.validate()?;

        let conv = weights
            .conv
            .into_iter()
            .map(|l| -> Result<ConvLayer> {
                let shape = (l.out_channels, l.in_channels, KERNEL, KERNEL);
                Ok(ConvLayer {
                    kernel: Array4::from_shape_vec(shape, l.kernel)
                        .map_err(|e| AnalysisError::InvalidWeights(e.to_string()))?,
                    bias: Array1::from_vec(l.bias),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let dense = weights
            .dense
            .into_iter()
            .map(|l| -> Result<DenseLayer> {
                Ok(DenseLayer {
                    weights: Array2::from_shape_vec((l.outputs, l.inputs), l.weights)
                        .map_err(|e| AnalysisError::InvalidWeights(e.to_string()))?,
                    bias: Array1::from_vec(l.bias),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            input_size: weights.input_size,
            conv,
            dense,
        })
    }

    /// Seeded template network
    pub fn seeded(input_size: u32, seed: u64) -> Result<Self> {
        Self::from_weights(CnnWeights::seeded(input_size, seed))
    }

    /// Load weights from `path`, falling back to the seeded template when the
    /// file is missing or unusable
    pub fn load_or_seeded(path: Option<&Path>, input_size: u32, seed: u64) -> Result<Self> {
        if let Some(path) = path {
            match CnnWeights::load(path).and_then(Self::from_weights) {
                Ok(model) => return Ok(model),
                Err(e) => {
                    process_warn!(
                        ProcessId::current(),
                        "⚠️ Could not load model weights from {}: {}; using seeded template",
                        path.display(),
                        e
                    );
                }
            }
        }
        Self::seeded(input_size, seed)
    }

    /// Raw class logits
    pub fn forward(&self, input: &ImageTensor) -> Result<Array1<f32>> {
        let side = self.input_size as usize;
        let expected = [side, side, CHANNELS[0]];
        if input.shape() != &expected[..] {
            return Err(AnalysisError::ShapeMismatch {
                expected: expected.to_vec(),
                actual: input.shape().to_vec(),
            });
        }

        let last = self.conv.len() - 1;
        let mut activation = input.clone();
        for (i, layer) in self.conv.iter().enumerate() {
            activation = conv2d_relu(&activation, layer);
            if i < last {
                activation = max_pool2(&activation);
            }
        }

        let pooled = activation
            .mean_axis(Axis(0))
            .and_then(|a| a.mean_axis(Axis(0)))
            .ok_or_else(|| AnalysisError::InvalidConfig("input too small for the network".to_string()))?;

        let hidden = (self.dense[0].weights.dot(&pooled) + &self.dense[0].bias).mapv(|v| v.max(0.0));
        Ok(self.dense[1].weights.dot(&hidden) + &self.dense[1].bias)
    }
}

/// Valid (unpadded) 3×3 convolution followed by ReLU; layout `(h, w, c)`
fn conv2d_relu(input: &Array3<f32>, layer: &ConvLayer) -> Array3<f32> {
    let (h, w, _) = input.dim();
    let (cout, cin, kh, kw) = layer.kernel.dim();
    let (oh, ow) = (h + 1 - kh, w + 1 - kw);

    let mut out = Array3::<f32>::zeros((oh, ow, cout));
    for y in 0..oh {
        for x in 0..ow {
            for o in 0..cout {
                let mut acc = layer.bias[o];
                for ky in 0..kh {
                    for kx in 0..kw {
                        for c in 0..cin {
                            acc += input[[y + ky, x + kx, c]] * layer.kernel[[o, c, ky, kx]];
                        }
                    }
                }
                out[[y, x, o]] = acc.max(0.0);
            }
        }
    }
    out
}

/// 2×2 max pooling with stride 2; a trailing odd row/column is dropped
fn max_pool2(input: &Array3<f32>) -> Array3<f32> {
    let (h, w, c) = input.dim();
    let (oh, ow) = (h / 2, w / 2);
    Array3::from_shape_fn((oh, ow, c), |(y, x, ch)| {
        let (y0, x0) = (y * 2, x * 2);
        input[[y0, x0, ch]]
            .max(input[[y0 + 1, x0, ch]])
            .max(input[[y0, x0 + 1, ch]])
            .max(input[[y0 + 1, x0 + 1, ch]])
    })
}

impl Classifier for CnnClassifier {
    fn backend(&self) -> ClassifierBackend {
        ClassifierBackend::Model
    }

    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn classify(&self, input: &ImageTensor) -> Result<ClassProbabilities> {
        let logits = self.forward(input)?;
        let logits: Vec<f64> = logits.iter().map(|v| f64::from(*v)).collect();
        Ok(ClassProbabilities::from_softmax_logits(&logits)?)
    }
}
