//! Minimal ONNX protobuf reader for pulling classifier weights out of a model file
//!
//! Only the fields needed to locate float initializers are declared; everything
//! else in the graph is skipped by the decoder.

use crate::error::VisionError;
use crate::tensor::Matrix;
use prost::Message;
use std::fs;
use std::path::Path;
use tracing::debug;

/// `TensorProto.DataType.FLOAT`
const ONNX_FLOAT: i32 = 1;

#[derive(Clone, PartialEq, Message)]
pub struct ModelProto {
    #[prost(message, optional, tag = "7")]
    pub graph: Option<GraphProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct GraphProto {
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(message, repeated, tag = "5")]
    pub initializer: Vec<TensorProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TensorProto {
    #[prost(int64, repeated, tag = "1")]
    pub dims: Vec<i64>,
    #[prost(int32, tag = "2")]
    pub data_type: i32,
    #[prost(float, repeated, tag = "4")]
    pub float_data: Vec<f32>,
    #[prost(string, tag = "8")]
    pub name: String,
    #[prost(bytes = "vec", tag = "9")]
    pub raw_data: Vec<u8>,
}

impl TensorProto {
    fn float_values(&self) -> Result<Vec<f32>, VisionError> {
        if !self.raw_data.is_empty() {
            if self.raw_data.len() % 4 != 0 {
                return Err(VisionError::Model(format!(
                    "Initializer {} has truncated raw data",
                    self.name
                )));
            }
            return Ok(self
                .raw_data
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect());
        }
        Ok(self.float_data.clone())
    }
}

/// First rank-2 float initializer of the graph, i.e. the final fully connected
/// layer's `classes × channels` weights for the Places365 networks
pub fn classifier_weights(bytes: &[u8]) -> Result<Matrix, VisionError> {
    let model = ModelProto::decode(bytes)
        .map_err(|e| VisionError::Model(format!("Failed to decode ONNX model: {}", e)))?;
    let graph = model
        .graph
        .ok_or_else(|| VisionError::Model("ONNX model has no graph".to_string()))?;

    let tensor = graph
        .initializer
        .iter()
        .find(|t| t.data_type == ONNX_FLOAT && t.dims.len() == 2)
        .ok_or_else(|| VisionError::Model("ONNX graph has no 2-D float initializer".to_string()))?;

    let (rows, cols) = (tensor.dims[0], tensor.dims[1]);
    if rows <= 0 || cols <= 0 {
        return Err(VisionError::Model(format!(
            "Initializer {} has invalid dims {:?}",
            tensor.name, tensor.dims
        )));
    }
    debug!("Using initializer {} ({}x{}) as classifier weights", tensor.name, rows, cols);
    Matrix::new(rows as usize, cols as usize, tensor.float_values()?)
}

pub fn read_classifier_weights(path: &Path) -> Result<Matrix, VisionError> {
    let bytes = fs::read(path)?;
    classifier_weights(&bytes)
}
