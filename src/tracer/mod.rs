//! Sampled span tracing.
//!
//! # Data Flow
//! ```text
//! Tracer::start_span(name, context)
//!     → sampled? (context.sampled, else Bernoulli at sampling_rate)
//!         no  → SpanRef without id; every later call is a no-op
//!         yes → Sink::start_span → active table (FIFO eviction at max_spans)
//!
//! Tracer::end_span(span)
//!     → removed from active table → Sink::end_span
//!     → `{name}_latency` metric returned to the caller
//! ```
//!
//! # Design Decisions
//! - Spans are owned by the tracer; callers hold only a `SpanRef`
//! - Capacity pressure evicts the oldest-started spans, never fails a call
//! - The sampling rate is adjustable at runtime without locking

pub mod active;
pub mod span_tracer;

pub use active::ActiveSpans;
pub use span_tracer::Tracer;
