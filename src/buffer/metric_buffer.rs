//! Sampled, per-series metric buffer.

use std::sync::Arc;

use dashmap::DashMap;

use crate::buffer::compression::{compress_batch, decompress_batch};
use crate::config::BufferConfig;
use crate::model::Metric;
use crate::observability::metrics;
use crate::resilience::RetryHandler;
use crate::sink::Sink;

/// Compressed flushes held back for one series.
#[derive(Debug, Default)]
struct CompressedSegments {
    segments: Vec<Vec<u8>>,
    bytes: usize,
}

#[derive(Debug)]
pub struct MetricBuffer {
    config: BufferConfig,
    buffers: DashMap<String, Vec<Metric>>,
    compressed: DashMap<String, CompressedSegments>,
    sink: Arc<dyn Sink>,
    retry: RetryHandler,
}

impl MetricBuffer {
    pub fn new(config: BufferConfig, sink: Arc<dyn Sink>, retry: RetryHandler) -> Self {
        Self {
            config,
            buffers: DashMap::new(),
            compressed: DashMap::new(),
            sink,
            retry,
        }
    }

    /// Sample and buffer one metric. Returns `false` when sampling dropped it.
    pub async fn add(&self, metric: Metric) -> bool {
        if fastrand::f64() >= self.config.sampling_rate {
            metrics::record_sampled_out();
            tracing::trace!(metric = %metric.name, "Metric sampled out");
            return false;
        }

        let key = metric.series_key();
        let full = {
            let mut entry = self.buffers.entry(key.clone()).or_default();
            entry.push(metric);
            if entry.len() >= self.config.max_size {
                Some(std::mem::take(entry.value_mut()))
            } else {
                None
            }
        };

        if let Some(batch) = full {
            self.buffers.remove_if(&key, |_, v| v.is_empty());
            self.flush_batch(key, batch).await;
        }
        true
    }

    /// Drain every buffered and compressed series to the sink.
    pub async fn flush_all(&self) {
        let keys: Vec<String> = self.buffers.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            if let Some((_, batch)) = self.buffers.remove(&key) {
                if !batch.is_empty() {
                    self.send(&batch).await;
                }
            }
        }

        let keys: Vec<String> = self.compressed.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            if let Some((key, held)) = self.compressed.remove(&key) {
                self.send_compressed(&key, held).await;
            }
        }
    }

    /// Metrics waiting in uncompressed buffers.
    pub fn buffered_count(&self) -> usize {
        self.buffers.iter().map(|e| e.value().len()).sum()
    }

    /// Compressed segments waiting across all series.
    pub fn compressed_segments(&self) -> usize {
        self.compressed.iter().map(|e| e.value().segments.len()).sum()
    }

    pub fn compressed_bytes(&self) -> usize {
        self.compressed.iter().map(|e| e.value().bytes).sum()
    }

    async fn flush_batch(&self, key: String, batch: Vec<Metric>) {
        if batch.len() <= self.config.compression_threshold {
            self.send(&batch).await;
            return;
        }

        let bytes = match compress_batch(&batch) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(series = %key, error = %e, "Compression failed, sending batch uncompressed");
                metrics::record_compression_fallback();
                self.send(&batch).await;
                return;
            }
        };

        tracing::debug!(
            series = %key,
            metrics = batch.len(),
            compressed_bytes = bytes.len(),
            "Batch compressed"
        );

        let overflow = {
            let mut held = self.compressed.entry(key.clone()).or_default();
            held.bytes += bytes.len();
            held.segments.push(bytes);
            held.bytes > self.config.max_compressed_bytes
        };

        if overflow {
            if let Some((key, held)) = self.compressed.remove(&key) {
                tracing::debug!(series = %key, bytes = held.bytes, "Compressed payload over limit, forcing flush");
                self.send_compressed(&key, held).await;
            }
        }
    }

    async fn send_compressed(&self, key: &str, held: CompressedSegments) {
        for segment in held.segments {
            match decompress_batch(&segment) {
                Ok(batch) => self.send(&batch).await,
                Err(e) => {
                    tracing::error!(series = %key, error = %e, "Dropping undecodable compressed batch");
                    metrics::record_dropped("buffer", 1);
                }
            }
        }
    }

    async fn send(&self, batch: &[Metric]) {
        let sink = &self.sink;
        for chunk in batch.chunks(self.config.batch_size.max(1)) {
            let result = self
                .retry
                .with_retry("buffer flush", move || sink.record_metrics(chunk))
                .await;

            if let Err(e) = result {
                tracing::error!(metrics = chunk.len(), error = %e, "Dropping metric batch");
                metrics::record_dropped("buffer", chunk.len());
            }
        }
    }
}
