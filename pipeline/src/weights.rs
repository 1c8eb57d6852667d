use crate::error::{PipelineError, Result};
use crate::tensor::Tensor;
use math::serialization::ReaderFrom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Emotion classes, in the order of the rows of the default classifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Joy,
    Sadness,
    Anger,
    Fear,
    Surprise,
    Disgust,
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Joy,
        Emotion::Sadness,
        Emotion::Anger,
        Emotion::Fear,
        Emotion::Surprise,
        Emotion::Disgust,
        Emotion::Neutral,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Emotion::Joy => "joy",
            Emotion::Sadness => "sadness",
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Surprise => "surprise",
            Emotion::Disgust => "disgust",
            Emotion::Neutral => "neutral",
        }
    }

    /// Class index to label. None when the classifier has more classes than
    /// there are labels.
    pub fn from_index(i: usize) -> Option<Emotion> {
        Self::ALL.get(i).copied()
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Emotion {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .find(|e| e.label() == s.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| PipelineError::Config(format!("unknown emotion '{}'", s)))
    }
}

/// Where classifier weights come from.
#[derive(Clone, Debug)]
pub enum WeightsSource {
    /// `{"weights": [[..], ..], "bias": [..]}`
    Json(PathBuf),
    /// One binary tensor file per array.
    Tensors { weights: PathBuf, bias: PathBuf },
    InMemory { weights: Vec<Vec<f64>>, bias: Vec<f64> },
}

#[derive(Serialize, Deserialize)]
struct WeightsDocument {
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

/// Plaintext linear classifier: C rows of D weights plus C biases.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassifierWeights {
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

impl ClassifierWeights {
    /// Validates the shape [classes x dim] of `weights`, the length of `bias`
    /// and that every value is finite.
    pub fn new(weights: Vec<Vec<f64>>, bias: Vec<f64>, classes: usize, dim: usize) -> Result<Self> {
        if classes == 0 || dim == 0 {
            return Err(PipelineError::ShapeMismatch(format!(
                "classifier must have at least one class and one input, got {}x{}",
                classes, dim
            )));
        }
        if weights.len() != classes {
            return Err(PipelineError::ShapeMismatch(format!(
                "expected {} weight rows, got {}",
                classes,
                weights.len()
            )));
        }
        if let Some((i, row)) = weights.iter().enumerate().find(|(_, row)| row.len() != dim) {
            return Err(PipelineError::ShapeMismatch(format!(
                "weight row {} has length {}, expected {}",
                i,
                row.len(),
                dim
            )));
        }
        if bias.len() != classes {
            return Err(PipelineError::ShapeMismatch(format!(
                "expected bias of length {}, got {}",
                classes,
                bias.len()
            )));
        }
        if weights.iter().flatten().chain(bias.iter()).any(|x| !x.is_finite()) {
            return Err(PipelineError::ShapeMismatch(
                "weights and bias must be finite".to_string(),
            ));
        }
        Ok(Self { weights, bias })
    }

    pub fn load(source: WeightsSource, classes: usize, dim: usize) -> Result<Self> {
        let (weights, bias) = match source {
            WeightsSource::Json(path) => {
                let doc: WeightsDocument = serde_json::from_reader(BufReader::new(File::open(&path)?))
                    .map_err(|e| PipelineError::Serialization(format!("{}: {}", path.display(), e)))?;
                (doc.weights, doc.bias)
            }
            WeightsSource::Tensors { weights, bias } => {
                let w: Vec<Vec<f64>> = read_tensor(&weights)?.to_matrix().ok_or_else(|| {
                    PipelineError::ShapeMismatch(format!("{}: weights must have rank 2", weights.display()))
                })?;
                let b: Vec<f64> = read_tensor(&bias)?.to_vector().ok_or_else(|| {
                    PipelineError::ShapeMismatch(format!("{}: bias must have rank 1", bias.display()))
                })?;
                (w, b)
            }
            WeightsSource::InMemory { weights, bias } => (weights, bias),
        };
        Self::new(weights, bias, classes, dim)
    }

    pub fn classes(&self) -> usize {
        self.weights.len()
    }

    pub fn dim(&self) -> usize {
        self.weights[0].len()
    }

    pub fn row(&self, class: usize) -> &[f64] {
        &self.weights[class]
    }

    pub fn bias(&self, class: usize) -> f64 {
        self.bias[class]
    }

    /// W*v + b in the clear.
    pub fn evaluate(&self, v: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(self.bias.iter())
            .map(|(row, b)| row.iter().zip(v.iter()).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&WeightsDocument {
            weights: self.weights.clone(),
            bias: self.bias.clone(),
        })
        .map_err(|e| PipelineError::Serialization(e.to_string()))
    }

    pub fn to_tensors(&self) -> (Tensor, Tensor) {
        (Tensor::from_matrix(&self.weights), Tensor::from_vector(&self.bias))
    }
}

fn read_tensor(path: &Path) -> Result<Tensor> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut tensor: Tensor = Tensor::default();
    tensor
        .read_from(&mut reader)
        .map_err(|e| PipelineError::Serialization(format!("{}: {}", path.display(), e)))?;
    Ok(tensor)
}
