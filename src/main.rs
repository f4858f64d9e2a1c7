//! Replays a captured SPDY connection through [`InputFilter`].
//!
//! Reads raw connection bytes from a file or stdin and writes the resulting
//! HTTP/1.1 request stream to stdout.

mod cli;

use std::{
    fs::File,
    io::{self, Read},
    process::ExitCode,
};

use clap::Parser;
use spdy_demux::{
    BlockMode,
    ConnectionContext,
    FilterConfig,
    InputFilter,
    IoSource,
    NegotiationState,
};

fn run(cli: &cli::Cli) -> Result<u64, Box<dyn std::error::Error>> {
    let input: Box<dyn Read> = match &cli.input {
        Some(path) => Box::new(File::open(path)?),
        None => Box::new(io::stdin().lock()),
    };
    let state = if cli.passthrough {
        NegotiationState::NotUsingSpdy
    } else {
        NegotiationState::UsingSpdy
    };
    let config = FilterConfig::default()
        .with_read_chunk(cli.chunk)
        .with_max_frame_len(cli.max_frame_len);
    let mut filter = InputFilter::with_config(
        IoSource::new(input),
        ConnectionContext::with_state(state),
        config,
    )?;

    let mut stdout = io::stdout().lock();
    let copied = io::copy(&mut filter.http_reader(BlockMode::Blocking), &mut stdout)?;
    Ok(copied)
}

fn main() -> ExitCode {
    // Logs go to stderr so stdout carries only the request stream.
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let cli = cli::Cli::parse();
    match run(&cli) {
        Ok(copied) => {
            tracing::debug!(bytes = copied, "request stream complete");
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(%error, "demultiplexing failed");
            ExitCode::FAILURE
        }
    }
}
