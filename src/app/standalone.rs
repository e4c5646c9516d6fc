use std::io;

use anyhow::Result;
use clap::Parser;
use mrpipe::standalone::{self, Args, LocalJob};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let job = LocalJob::from(Args::parse().command);
    for path in standalone::run(&job)? {
        info!(output = %path.display(), "wrote");
    }
    Ok(())
}
