//! Radioline Core - Bounded-queue producer/consumer pipeline for
//! rate-limited network harvesting.
//!
//! Provides the generic pieces the stage crates plug into: a throttled
//! fetch client, a bounded task queue, the worker pipeline, and a
//! concurrent JSON Lines sink.

pub mod client;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod queue;
pub mod sink;
pub mod throttle;

// Re-exports for convenience
pub use client::{
    ClientConfig, FetchOptions, Fetched, HttpClient, StreamDescriptor, accept_stream_content,
    normalize_url,
};
pub use error::FetchError;
pub use logging::init_logging;
pub use pipeline::{Emitter, Pipeline, PipelineStopped, Summary, TaskProcessor, TaskSource};
pub use queue::{Recv, TaskQueue};
pub use sink::JsonLinesSink;
pub use throttle::RateThrottle;
