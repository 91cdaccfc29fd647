use std::sync::Arc;
use std::time::Instant;
use strum_macros::Display;
use uuid::Uuid;

use super::classifier::Classifier;
use super::decoder::{UploadedAsset, decode};
use super::error::InferenceError;
use super::interpreter::{ClassTaxonomy, PredictionResult};
use super::normalizer::normalize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PipelineStage {
    Received,
    Decoding,
    Normalizing,
    Inferring,
    Interpreting,
    Completed,
    Failed,
}

/// Runs one upload through decode, normalize, predict and interpret.
///
/// Holds only read-only shared state, so a single instance serves every
/// request concurrently. The first failing stage ends the request; nothing
/// is retried.
#[derive(Clone)]
pub struct InferencePipeline {
    classifier: Arc<dyn Classifier>,
    taxonomy: Arc<ClassTaxonomy>,
}

impl InferencePipeline {
    pub fn new(classifier: Arc<dyn Classifier>, taxonomy: Arc<ClassTaxonomy>) -> Self {
        Self {
            classifier,
            taxonomy,
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.classifier.is_loaded()
    }

    pub fn handle(&self, asset: UploadedAsset) -> Result<PredictionResult, InferenceError> {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        let mut stage = PipelineStage::Received;
        log::debug!(
            "[{}] {} {} bytes ({}, file {:?})",
            request_id,
            stage,
            asset.bytes.len(),
            asset.content_type,
            asset.file_name
        );

        match self.run(&asset, request_id, &mut stage) {
            Ok(result) => {
                log::info!(
                    "[{}] {} as {} ({:.2}%) in {:?}",
                    request_id,
                    PipelineStage::Completed,
                    result.class_id,
                    result.confidence,
                    started.elapsed()
                );
                Ok(result)
            }
            Err(e) => {
                let failed_at = stage;
                stage = PipelineStage::Failed;
                log::debug!("[{}] {} -> {}", request_id, failed_at, stage);
                if e.is_client_error() {
                    log::warn!("[{}] rejected during {}: {}", request_id, failed_at, e);
                } else {
                    log::error!("[{}] failed during {}: {}", request_id, failed_at, e);
                }
                Err(e)
            }
        }
    }

    fn run(
        &self,
        asset: &UploadedAsset,
        request_id: Uuid,
        stage: &mut PipelineStage,
    ) -> Result<PredictionResult, InferenceError> {
        let mut enter = |next: PipelineStage| {
            log::debug!("[{}] {} -> {}", request_id, stage, next);
            *stage = next;
        };

        enter(PipelineStage::Decoding);
        let raster = decode(asset)?;

        enter(PipelineStage::Normalizing);
        let tensor = normalize(raster);

        enter(PipelineStage::Inferring);
        let probs = self.classifier.predict(&tensor)?;

        enter(PipelineStage::Interpreting);
        let result = self.taxonomy.interpret(&probs)?;

        enter(PipelineStage::Completed);
        Ok(result)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pipeline::classifier::{ClassifierError, ProbabilityVector};
    use crate::pipeline::decoder::tests::solid_png;
    use crate::pipeline::normalizer::{INPUT_SHAPE, InputTensor};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns fixed scores after checking it was handed a well-formed tensor.
    pub(crate) struct FixedClassifier {
        pub scores: Vec<f32>,
        pub calls: AtomicUsize,
    }

    impl FixedClassifier {
        pub(crate) fn new(scores: Vec<f32>) -> Self {
            Self {
                scores,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Classifier for FixedClassifier {
        fn predict(&self, input: &InputTensor) -> Result<ProbabilityVector, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(input.shape(), &INPUT_SHAPE);
            Ok(ProbabilityVector::new(self.scores.clone()))
        }
    }

    pub(crate) struct FailingClassifier;

    impl Classifier for FailingClassifier {
        fn predict(&self, _input: &InputTensor) -> Result<ProbabilityVector, ClassifierError> {
            Err(ClassifierError::Backend("device lost".into()))
        }

        fn is_loaded(&self) -> bool {
            false
        }
    }

    fn pipeline_with(classifier: Arc<dyn Classifier>) -> InferencePipeline {
        InferencePipeline::new(classifier, Arc::new(ClassTaxonomy::default()))
    }

    fn stage_reached(pipeline: &InferencePipeline, asset: UploadedAsset) -> PipelineStage {
        let mut stage = PipelineStage::Received;
        let _ = pipeline.run(&asset, Uuid::nil(), &mut stage);
        stage
    }

    #[test]
    fn failures_stop_at_the_stage_that_raised_them() {
        let ok = pipeline_with(Arc::new(FixedClassifier::new(vec![0.7, 0.2, 0.1])));
        let png = solid_png(6, 6, [1, 2, 3]);

        let wrong_type = UploadedAsset::new(png.clone(), "text/plain");
        assert_eq!(stage_reached(&ok, wrong_type), PipelineStage::Decoding);

        let corrupt = UploadedAsset::new(b"not an image".to_vec(), "image/png");
        assert_eq!(stage_reached(&ok, corrupt), PipelineStage::Decoding);

        let failing = pipeline_with(Arc::new(FailingClassifier));
        let good = UploadedAsset::new(png.clone(), "image/png");
        assert_eq!(stage_reached(&failing, good), PipelineStage::Inferring);

        let short = pipeline_with(Arc::new(FixedClassifier::new(vec![1.0])));
        let good = UploadedAsset::new(png.clone(), "image/png");
        assert_eq!(stage_reached(&short, good), PipelineStage::Interpreting);

        let good = UploadedAsset::new(png, "image/png");
        assert_eq!(stage_reached(&ok, good), PipelineStage::Completed);
    }

    #[test]
    fn stage_names_are_logged_as_variants() {
        assert_eq!(PipelineStage::Inferring.to_string(), "Inferring");
        assert_eq!(PipelineStage::Failed.to_string(), "Failed");
    }

    #[test]
    fn red_png_runs_every_stage() {
        let classifier = Arc::new(FixedClassifier::new(vec![0.7, 0.2, 0.1]));
        let pipeline = pipeline_with(classifier.clone());
        let asset = UploadedAsset::new(solid_png(10, 10, [255, 0, 0]), "image/png");

        let result = pipeline.handle(asset).unwrap();
        assert_eq!(result.class_id, "Tomato-Bacterial_spot");
        assert_eq!(result.all_probabilities.len(), 3);
        let total: f64 = result.all_probabilities.values().sum();
        assert!((total - 100.0).abs() < 0.05);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn content_type_is_checked_before_the_model_runs() {
        let classifier = Arc::new(FixedClassifier::new(vec![0.7, 0.2, 0.1]));
        let pipeline = pipeline_with(classifier.clone());
        let asset = UploadedAsset::new(solid_png(10, 10, [255, 0, 0]), "text/plain");

        assert!(matches!(
            pipeline.handle(asset),
            Err(InferenceError::InvalidContentType(_))
        ));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn undecodable_bytes_never_reach_the_model() {
        let classifier = Arc::new(FixedClassifier::new(vec![0.7, 0.2, 0.1]));
        let pipeline = pipeline_with(classifier.clone());
        let asset = UploadedAsset::new(b"hello, world".to_vec(), "image/png");

        assert!(matches!(
            pipeline.handle(asset),
            Err(InferenceError::InvalidImageData(_))
        ));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn model_failures_are_model_invocation_errors() {
        let pipeline = pipeline_with(Arc::new(FailingClassifier));
        let asset = UploadedAsset::new(solid_png(10, 10, [0, 255, 0]), "image/png");

        let err = pipeline.handle(asset).unwrap_err();
        assert!(matches!(err, InferenceError::ModelInvocation(_)));
        assert!(!err.is_client_error());
        assert!(!pipeline.model_loaded());
    }

    #[test]
    fn short_output_vector_is_a_model_invocation_error() {
        let pipeline = pipeline_with(Arc::new(FixedClassifier::new(vec![1.0])));
        let asset = UploadedAsset::new(solid_png(10, 10, [0, 0, 255]), "image/png");

        assert!(matches!(
            pipeline.handle(asset),
            Err(InferenceError::ModelInvocation(
                ClassifierError::OutputLength { expected: 3, actual: 1 }
            ))
        ));
    }

    #[test]
    fn failures_leave_the_pipeline_reusable() {
        let pipeline = pipeline_with(Arc::new(FixedClassifier::new(vec![0.1, 0.1, 0.8])));
        let bad = UploadedAsset::new(Vec::new(), "image/png");
        assert!(pipeline.handle(bad).is_err());

        let good = UploadedAsset::new(solid_png(3, 3, [9, 9, 9]), "image/png");
        assert_eq!(pipeline.handle(good).unwrap().class_id, "Corn-Common_rust");
    }

    #[test]
    fn concurrent_requests_share_one_pipeline() {
        let classifier = Arc::new(FixedClassifier::new(vec![0.1, 0.6, 0.3]));
        let pipeline = pipeline_with(classifier.clone());

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4u8)
                .map(|i| {
                    let pipeline = &pipeline;
                    scope.spawn(move || {
                        let bytes = solid_png(5 + u32::from(i), 7, [i * 40, 10, 10]);
                        pipeline.handle(UploadedAsset::new(bytes, "image/png"))
                    })
                })
                .collect();
            for handle in handles {
                let result = handle.join().unwrap().unwrap();
                assert_eq!(result.class_id, "Potato-Early_blight");
            }
        });
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 4);
    }
}
