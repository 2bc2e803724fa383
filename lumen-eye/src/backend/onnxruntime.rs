//! ONNX Runtime backend

use super::{InferenceBackend, ModelDescriptor, ModelHandle};
use crate::config::ExecutionEnv;
use crate::error::VisionError;
use crate::tensor::Tensor;
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider, ExecutionProviderDispatch};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor as OrtTensor;
use tracing::info;

/// Loads ONNX models into ONNX Runtime sessions
#[derive(Debug, Clone, Copy)]
pub struct OrtBackend {
    env: ExecutionEnv,
}

impl OrtBackend {
    pub fn new(env: ExecutionEnv) -> Self {
        Self { env }
    }

    fn execution_provider(&self) -> ExecutionProviderDispatch {
        match self.env {
            ExecutionEnv::Cpu => CPUExecutionProvider::default().build(),
            ExecutionEnv::Cuda { device_id } => {
                CUDAExecutionProvider::default().with_device_id(device_id).build()
            }
        }
    }
}

impl InferenceBackend for OrtBackend {
    fn load(&self, descriptor: &ModelDescriptor) -> Result<Box<dyn ModelHandle>, VisionError> {
        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_execution_providers([self.execution_provider()]))
            .and_then(|b| b.commit_from_file(&descriptor.path))
            .map_err(|e| {
                VisionError::Ort(format!(
                    "Failed to load model {} from {:?}: {}",
                    descriptor.name, descriptor.path, e
                ))
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| VisionError::Model(format!("Model {} declares no inputs", descriptor.name)))?;
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        if output_names.len() < descriptor.output_arity {
            return Err(VisionError::Model(format!(
                "Model {} has {} outputs, expected {}",
                descriptor.name,
                output_names.len(),
                descriptor.output_arity
            )));
        }

        info!(
            "Model {} loaded from {:?} ({:?}, input {}, outputs {:?})",
            descriptor.name, descriptor.path, self.env, input_name, output_names
        );

        Ok(Box::new(OrtHandle {
            name: descriptor.name.clone(),
            session,
            input_name,
            output_names,
        }))
    }
}

struct OrtHandle {
    name: String,
    session: Session,
    input_name: String,
    output_names: Vec<String>,
}

impl ModelHandle for OrtHandle {
    fn run(&mut self, input: &Tensor) -> Result<Vec<Tensor>, VisionError> {
        let value = OrtTensor::from_array((input.shape().to_vec(), input.data().to_vec()))
            .map_err(|e| VisionError::Ort(format!("Failed to create input value: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => value])
            .map_err(|e| VisionError::Inference(format!("{} inference failed: {}", self.name, e)))?;

        let mut tensors = Vec::with_capacity(self.output_names.len());
        for name in &self.output_names {
            let (shape, data) = outputs[name.as_str()].try_extract_tensor::<f32>().map_err(|e| {
                VisionError::Inference(format!("Failed to extract output {} as f32: {}", name, e))
            })?;
            let shape: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
            tensors.push(Tensor::new(shape, data.to_vec())?);
        }
        Ok(tensors)
    }
}
