use super::normalizer::{INPUT_SHAPE, InputTensor};

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("input tensor shape {actual:?} does not match model signature {expected:?}")]
    InputShape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("model returned {actual} scores, expected {expected}")]
    OutputLength { expected: usize, actual: usize },
    #[error("model returned a non-finite score at index {index}")]
    NonFiniteScore { index: usize },
    #[error("model lock poisoned")]
    LockPoisoned,
    #[cfg(feature = "torch")]
    #[error("torch error: {0}")]
    Torch(#[from] tch::TchError),
    #[error("{0}")]
    Backend(String),
}

/// Raw per-class scores in taxonomy order. Softmax is assumed, not checked.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityVector(Vec<f32>);

impl ProbabilityVector {
    pub fn new(scores: Vec<f32>) -> Self {
        Self(scores)
    }

    pub fn scores(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index of the highest score; the first one wins on ties.
    pub fn argmax(&self) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (idx, &score) in self.0.iter().enumerate() {
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((idx, score)),
            }
        }
        best.map(|(idx, _)| idx)
    }
}

impl From<Vec<f32>> for ProbabilityVector {
    fn from(scores: Vec<f32>) -> Self {
        Self(scores)
    }
}

/// Tensor in, probability vector out. Implementations are loaded once and
/// shared read-only across requests.
pub trait Classifier: Send + Sync {
    fn predict(&self, input: &InputTensor) -> Result<ProbabilityVector, ClassifierError>;

    fn is_loaded(&self) -> bool {
        true
    }
}

pub(crate) fn check_input_shape(input: &InputTensor) -> Result<(), ClassifierError> {
    if input.shape() != INPUT_SHAPE {
        return Err(ClassifierError::InputShape {
            expected: INPUT_SHAPE.to_vec(),
            actual: input.shape().to_vec(),
        });
    }
    Ok(())
}

#[cfg(feature = "torch")]
pub use torch::TorchClassifier;

#[cfg(feature = "torch")]
mod torch {
    use std::path::Path;
    use std::sync::Mutex;
    use tch::{CModule, Device, Kind, Tensor};

    use super::{Classifier, ClassifierError, ProbabilityVector, check_input_shape};
    use crate::pipeline::normalizer::{INPUT_SHAPE, InputTensor};

    /// TorchScript module evaluated through libtorch.
    pub struct TorchClassifier {
        module: Mutex<CModule>,
        device: Device,
        num_classes: usize,
    }

    impl TorchClassifier {
        pub fn load(path: impl AsRef<Path>, num_classes: usize) -> Result<Self, ClassifierError> {
            let device = Device::cuda_if_available();
            let mut module = CModule::load_on_device(path.as_ref(), device)?;
            module.set_eval();
            log::info!(
                "Loaded model {} on {:?} ({} classes)",
                path.as_ref().display(),
                device,
                num_classes
            );
            Ok(Self {
                module: Mutex::new(module),
                device,
                num_classes,
            })
        }
    }

    /// Half-precision NHWC tensor matching the model's input signature.
    pub(crate) fn to_torch_input(input: &InputTensor) -> Result<Tensor, ClassifierError> {
        check_input_shape(input)?;
        let data = input
            .as_slice()
            .ok_or_else(|| ClassifierError::Backend("input tensor is not contiguous".into()))?;
        let shape: Vec<i64> = INPUT_SHAPE.iter().map(|&d| d as i64).collect();
        Ok(Tensor::from_slice(data).view(shape.as_slice()))
    }

    /// Flattens model output to `f32` scores, one per class.
    pub(crate) fn scores_from_output(
        output: &Tensor,
        num_classes: usize,
    ) -> Result<ProbabilityVector, ClassifierError> {
        let flat = output.to_kind(Kind::Float).to_device(Device::Cpu).view([-1]);
        let scores = Vec::<f32>::try_from(&flat)?;
        if scores.len() != num_classes {
            return Err(ClassifierError::OutputLength {
                expected: num_classes,
                actual: scores.len(),
            });
        }
        Ok(ProbabilityVector::new(scores))
    }

    impl Classifier for TorchClassifier {
        fn predict(&self, input: &InputTensor) -> Result<ProbabilityVector, ClassifierError> {
            let tensor = to_torch_input(input)?.to_device(self.device);
            let output = {
                let _guard = tch::no_grad_guard();
                let module = self.module.lock().map_err(|_| ClassifierError::LockPoisoned)?;
                module.forward_ts(&[tensor])?
            };
            scores_from_output(&output, self.num_classes)
        }
    }

}
