use std::collections::BTreeMap;

use super::classifier::{ClassifierError, ProbabilityVector};

pub const LABEL_SEPARATOR: char = '-';

/// Output index order of the deployed model.
pub const DEFAULT_CLASS_NAMES: [&str; 3] = [
    "Tomato-Bacterial_spot",
    "Potato-Early_blight",
    "Corn-Common_rust",
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TaxonomyError {
    #[error("class taxonomy is empty")]
    Empty,
    #[error("class label {0:?} must contain exactly one '-'")]
    MalformedLabel(String),
    #[error("class label {0:?} appears more than once")]
    DuplicateLabel(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabel {
    pub id: String,
    pub plant_type: String,
    pub disease: String,
}

impl ClassLabel {
    fn parse(id: &str) -> Result<Self, TaxonomyError> {
        let mut parts = id.split(LABEL_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(plant_type), Some(disease), None) => Ok(Self {
                id: id.to_string(),
                plant_type: plant_type.to_string(),
                disease: disease.to_string(),
            }),
            _ => Err(TaxonomyError::MalformedLabel(id.to_string())),
        }
    }
}

/// Ordered class labels, validated once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct ClassTaxonomy {
    labels: Vec<ClassLabel>,
}

impl ClassTaxonomy {
    pub fn new<I, S>(names: I) -> Result<Self, TaxonomyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut labels: Vec<ClassLabel> = Vec::new();
        for name in names {
            let label = ClassLabel::parse(name.as_ref())?;
            if labels.iter().any(|l| l.id == label.id) {
                return Err(TaxonomyError::DuplicateLabel(label.id));
            }
            labels.push(label);
        }
        if labels.is_empty() {
            return Err(TaxonomyError::Empty);
        }
        Ok(Self { labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[ClassLabel] {
        &self.labels
    }

    /// Turns raw scores into a labelled result. The vector must have one
    /// score per label; anything else means the model broke its contract.
    pub fn interpret(
        &self,
        probs: &ProbabilityVector,
    ) -> Result<PredictionResult, ClassifierError> {
        if probs.len() != self.labels.len() {
            return Err(ClassifierError::OutputLength {
                expected: self.labels.len(),
                actual: probs.len(),
            });
        }
        if let Some(index) = probs.scores().iter().position(|s| !s.is_finite()) {
            return Err(ClassifierError::NonFiniteScore { index });
        }
        let index = probs.argmax().ok_or(ClassifierError::OutputLength {
            expected: self.labels.len(),
            actual: 0,
        })?;

        let scores = probs.scores();
        let label = &self.labels[index];
        let all_probabilities = self
            .labels
            .iter()
            .zip(scores)
            .map(|(label, &score)| (label.id.clone(), to_percentage(score)))
            .collect();

        Ok(PredictionResult {
            plant_type: label.plant_type.clone(),
            disease: label.disease.clone(),
            confidence: to_percentage(scores[index]),
            class_id: label.id.clone(),
            class_index: index,
            all_probabilities,
        })
    }
}

impl Default for ClassTaxonomy {
    fn default() -> Self {
        Self {
            labels: DEFAULT_CLASS_NAMES
                .iter()
                .filter_map(|name| ClassLabel::parse(name).ok())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub plant_type: String,
    pub disease: String,
    pub confidence: f64,
    pub class_id: String,
    pub class_index: usize,
    pub all_probabilities: BTreeMap<String, f64>,
}

impl From<PredictionResult> for shared::PredictionResponse {
    fn from(result: PredictionResult) -> Self {
        shared::PredictionResponse {
            success: true,
            plant_type: result.plant_type,
            disease: result.disease,
            confidence: result.confidence,
            class_name: result.class_id,
            all_probabilities: result.all_probabilities,
        }
    }
}

/// score * 100, rounded to 2 decimals from its exact binary value, ties to even.
fn to_percentage(score: f32) -> f64 {
    let percentage = f64::from(score) * 100.0;
    format!("{percentage:.2}").parse().unwrap_or(percentage)
}
