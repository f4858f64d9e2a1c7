//! Metric helpers for the demultiplexing pipeline.
//!
//! With the `metrics` feature enabled these forward to the global
//! [`metrics`](https://docs.rs/metrics) recorder; without it they compile to
//! nothing.

/// Counter of decoded frames, labelled by `kind`.
pub const FRAMES_PROCESSED: &str = "spdy_demux_frames_processed_total";
/// Counter of logical streams opened by `SYN_STREAM`.
pub const STREAMS_OPENED: &str = "spdy_demux_streams_opened_total";
/// Counter of logical streams failed with a protocol error.
pub const STREAM_ERRORS: &str = "spdy_demux_stream_errors_total";

/// Record one decoded frame of the given kind.
#[cfg(feature = "metrics")]
pub fn inc_frames(kind: &'static str) {
    metrics::counter!(FRAMES_PROCESSED, "kind" => kind).increment(1);
}

/// Record one decoded frame of the given kind.
#[cfg(not(feature = "metrics"))]
pub fn inc_frames(_kind: &'static str) {}

/// Record a newly opened stream.
#[cfg(feature = "metrics")]
pub fn inc_streams_opened() { metrics::counter!(STREAMS_OPENED).increment(1); }

/// Record a newly opened stream.
#[cfg(not(feature = "metrics"))]
pub fn inc_streams_opened() {}

/// Record a stream failed with a protocol error.
#[cfg(feature = "metrics")]
pub fn inc_stream_errors() { metrics::counter!(STREAM_ERRORS).increment(1); }

/// Record a stream failed with a protocol error.
#[cfg(not(feature = "metrics"))]
pub fn inc_stream_errors() {}
