//! Command line interface for the `spdy-demux` binary.
//!
//! Replays a captured SPDY byte stream through the input filter and prints
//! the HTTP/1.1 requests it yields.

use std::path::PathBuf;

use clap::Parser;

/// Command line arguments for the `spdy-demux` binary.
#[derive(Debug, Parser)]
#[command(
    name = "spdy-demux",
    version,
    about = "Demultiplex a raw SPDY/2 stream into HTTP/1.1 requests"
)]
pub struct Cli {
    /// File holding the raw connection bytes; stdin when omitted.
    pub input: Option<PathBuf>,

    /// Treat the connection as not having negotiated SPDY.
    #[arg(long)]
    pub passthrough: bool,

    /// Maximum raw bytes read from the input at once.
    #[arg(long, default_value_t = 8192)]
    pub chunk: usize,

    /// Largest frame payload accepted, in bytes.
    #[arg(long, default_value_t = 0x00ff_ffff)]
    pub max_frame_len: usize,
}
