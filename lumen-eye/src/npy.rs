//! Reader for 2-D float arrays stored in NumPy `.npy` files

use crate::error::VisionError;
use crate::tensor::Matrix;

const MAGIC: &[u8] = b"\x93NUMPY";

#[derive(Debug, PartialEq)]
struct Header {
    little_endian: bool,
    width: usize,
    fortran_order: bool,
    shape: Vec<usize>,
}

/// Decode a `float32`/`float64` matrix; values are converted to `f32`
pub fn read_matrix(bytes: &[u8]) -> Result<Matrix, VisionError> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err(VisionError::Resource("Not a .npy file".to_string()));
    }

    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(VisionError::Resource("Truncated .npy header".to_string()));
            }
            (u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize, 12)
        }
        v => return Err(VisionError::Resource(format!("Unsupported .npy version {}", v))),
    };

    let data_start = header_start + header_len;
    let header_bytes = bytes
        .get(header_start..data_start)
        .ok_or_else(|| VisionError::Resource("Truncated .npy header".to_string()))?;
    let header = parse_header(&String::from_utf8_lossy(header_bytes))?;

    let (rows, cols) = match header.shape.as_slice() {
        [rows, cols] => (*rows, *cols),
        other => {
            return Err(VisionError::Resource(format!(
                "Expected a 2-D array, got shape {:?}",
                other
            )))
        }
    };

    if rows == 0 || cols == 0 {
        return Err(VisionError::Resource(format!("Empty array of shape ({}, {})", rows, cols)));
    }
    let (count, expected_len) = rows
        .checked_mul(cols)
        .and_then(|count| Some((count, count.checked_mul(header.width)?)))
        .ok_or_else(|| {
            VisionError::Resource(format!("Array shape ({}, {}) would overflow", rows, cols))
        })?;
    let payload = &bytes[data_start..];
    if payload.len() != expected_len {
        return Err(VisionError::Resource(format!(
            "Array payload is {} bytes, expected {}",
            payload.len(),
            expected_len
        )));
    }

    let values: Vec<f32> = payload
        .chunks_exact(header.width)
        .map(|chunk| decode_float(chunk, header.little_endian))
        .collect();

    let data = if header.fortran_order {
        let mut row_major = vec![0.0f32; count];
        for c in 0..cols {
            for r in 0..rows {
                row_major[r * cols + c] = values[c * rows + r];
            }
        }
        row_major
    } else {
        values
    };

    Matrix::new(rows, cols, data).map_err(|e| VisionError::Resource(e.to_string()))
}

fn decode_float(chunk: &[u8], little_endian: bool) -> f32 {
    match (chunk.len(), little_endian) {
        (4, true) => f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
        (4, false) => f32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
        (_, le) => {
            let mut b = [0u8; 8];
            b.copy_from_slice(chunk);
            if le {
                f64::from_le_bytes(b) as f32
            } else {
                f64::from_be_bytes(b) as f32
            }
        }
    }
}

fn parse_header(header: &str) -> Result<Header, VisionError> {
    let descr = quoted_value(header, "descr")
        .ok_or_else(|| VisionError::Resource("Missing descr in .npy header".to_string()))?;
    let (little_endian, width) = match descr {
        "<f4" | "|f4" | "=f4" => (true, 4),
        ">f4" => (false, 4),
        "<f8" | "|f8" | "=f8" => (true, 8),
        ">f8" => (false, 8),
        other => {
            return Err(VisionError::Resource(format!("Unsupported dtype {}", other)));
        }
    };

    let fortran_order = raw_value(header, "fortran_order")
        .map(|v| v.trim_start().starts_with("True"))
        .unwrap_or(false);

    let shape_src = raw_value(header, "shape")
        .and_then(|v| {
            let open = v.find('(')?;
            let close = v.find(')')?;
            v.get(open + 1..close)
        })
        .ok_or_else(|| VisionError::Resource("Missing shape in .npy header".to_string()))?;
    let shape = shape_src
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| VisionError::Resource(format!("Bad shape entry {}", s)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Header { little_endian, width, fortran_order, shape })
}

/// Text following `'key':`
fn raw_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let pattern = format!("'{}':", key);
    let start = header.find(&pattern)? + pattern.len();
    header.get(start..)
}

fn quoted_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let rest = raw_value(header, key)?;
    let open = rest.find('\'')?;
    let rest = &rest[open + 1..];
    let close = rest.find('\'')?;
    Some(&rest[..close])
}
