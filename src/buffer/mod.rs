//! Metric buffering subsystem.
//!
//! # Data Flow
//! ```text
//! MetricBuffer::add
//!     → sampling draw (drop when draw >= sampling_rate)
//!     → per-series buffer (name + serialized labels)
//!     → len == max_size ─▶ flush
//!
//! flush(batch):
//!     len > compression_threshold
//!         → compression.rs (JSON + LZ4) → held in compressed map
//!         → held bytes > max_compressed_bytes ─▶ decompress → send
//!     otherwise → send
//!
//! send: chunks of batch_size → RetryHandler → Sink::record_metrics
//! ```
//!
//! # Design Decisions
//! - Map state is updated before any await; sink calls never hold a map guard
//! - A batch that fails to compress is sent uncompressed
//! - A batch that exhausts its retries is dropped, logged and counted
//! - `flush_all` drains both maps; it runs on every periodic sweep and at shutdown

pub mod compression;
pub mod metric_buffer;

pub use metric_buffer::MetricBuffer;
