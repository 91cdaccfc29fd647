pub mod classifier;
pub mod decoder;
pub mod error;
pub mod interpreter;
pub mod normalizer;
pub mod orchestrator;

pub use classifier::{Classifier, ClassifierError, ProbabilityVector};
pub use decoder::UploadedAsset;
pub use error::InferenceError;
pub use interpreter::{ClassTaxonomy, PredictionResult, TaxonomyError};
pub use orchestrator::InferencePipeline;
