//! Inference backend seam
//!
//! Pipelines only ever see [`InferenceBackend::load`] and [`ModelHandle::run`], so the
//! runtime behind them can be swapped for anything that evaluates an ONNX graph.

pub mod onnxruntime;

use crate::error::VisionError;
use crate::tensor::Tensor;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

pub use onnxruntime::OrtBackend;

/// Number of timed runs in benchmark mode
pub const BENCHMARK_ROUNDS: usize = 5;

/// A locally available model ready to be loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub name: String,
    pub path: PathBuf,
    /// Number of output tensors the caller expects back
    pub output_arity: usize,
}

/// Loaded network
pub trait ModelHandle {
    /// Run one forward pass; outputs are returned in graph order
    fn run(&mut self, input: &Tensor) -> Result<Vec<Tensor>, VisionError>;
}

/// Something that can turn a descriptor into a runnable handle
pub trait InferenceBackend {
    fn load(&self, descriptor: &ModelDescriptor) -> Result<Box<dyn ModelHandle>, VisionError>;
}

/// Run the handle once and check the output arity
pub fn infer(
    handle: &mut dyn ModelHandle,
    input: &Tensor,
    output_arity: usize,
) -> Result<Vec<Tensor>, VisionError> {
    let outputs = handle.run(input)?;
    if outputs.len() < output_arity {
        return Err(VisionError::Inference(format!(
            "Expected {} output tensors, got {}",
            output_arity,
            outputs.len()
        )));
    }
    debug!(
        "Inference produced {} outputs: {:?}",
        outputs.len(),
        outputs.iter().map(|t| t.shape().to_vec()).collect::<Vec<_>>()
    );
    Ok(outputs)
}

/// Run [`BENCHMARK_ROUNDS`] timed passes when `benchmark` is set, keeping the last result
pub fn infer_timed(
    handle: &mut dyn ModelHandle,
    input: &Tensor,
    output_arity: usize,
    benchmark: bool,
) -> Result<Vec<Tensor>, VisionError> {
    if !benchmark {
        return infer(handle, input, output_arity);
    }

    info!("BENCHMARK mode");
    let mut outputs = Vec::new();
    for _ in 0..BENCHMARK_ROUNDS {
        let start = Instant::now();
        outputs = infer(handle, input, output_arity)?;
        info!("\tprocessing time {} ms", start.elapsed().as_millis());
    }
    Ok(outputs)
}
