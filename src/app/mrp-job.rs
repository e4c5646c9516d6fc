use std::io;

use anyhow::Result;
use clap::Parser;
use mrpipe::cmd::job::{Args, Commands};
use mrpipe::job::{open_map_output, open_reduce_output};
use mrpipe::workload;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // stdout carries map output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let workload = workload::named(args.command.workload())?;
    let params = args.command.init_params();
    let stdin = io::stdin();
    let mut input = stdin.lock();

    match args.command {
        Commands::Map { .. } => {
            let mut out = open_map_output();
            (workload.map_fn)(params, &mut input, &mut out)?;
        }
        Commands::Reduce { rid, outdir, .. } => {
            let mut out = open_reduce_output(&outdir, rid)?;
            (workload.reduce_fn)(params, rid, &mut input, &mut out)?;
        }
    }
    Ok(())
}
