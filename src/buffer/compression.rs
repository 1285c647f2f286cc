//! Batch compression for held-back buffer flushes.
//!
//! A batch is serialized as a JSON array and LZ4-compressed with its
//! uncompressed length prepended.

use lz4_flex::{compress_prepend_size, decompress_size_prepended};

use crate::error::{PipelineError, Result};
use crate::model::Metric;

/// Fails on non-finite values, which JSON would turn into `null` and never decode.
pub fn compress_batch(metrics: &[Metric]) -> Result<Vec<u8>> {
    if let Some(bad) = metrics.iter().find(|m| !m.value.is_finite()) {
        return Err(PipelineError::Compression(format!(
            "metric '{}' has non-finite value {}",
            bad.name, bad.value
        )));
    }
    let json = serde_json::to_vec(metrics)
        .map_err(|e| PipelineError::Compression(format!("serialize batch: {}", e)))?;
    Ok(compress_prepend_size(&json))
}

pub fn decompress_batch(bytes: &[u8]) -> Result<Vec<Metric>> {
    let json = decompress_size_prepended(bytes)
        .map_err(|e| PipelineError::Compression(format!("decompress batch: {}", e)))?;
    serde_json::from_slice(&json)
        .map_err(|e| PipelineError::Compression(format!("deserialize batch: {}", e)))
}
