//! A single-machine driver: map every input file, partition by key hash,
//! sort each partition in memory in place of the external shuffle, then
//! reduce. There is no retry and no distribution.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::job::InitParams;
use crate::{lock, workload};

pub mod engine;

/// Default number of reducers for a standalone job.
pub const DEFAULT_N_REDUCE: u32 = 4;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a job on this machine
    Submit {
        /// Glob spec for the input files
        #[arg(short, long)]
        input: String,

        /// Name of the workload
        #[arg(short, long)]
        workload: String,

        /// Output directory
        #[arg(short, long)]
        output: String,

        /// Number of reducers
        #[arg(short, long, default_value_t = DEFAULT_N_REDUCE)]
        n_reduce: u32,

        /// `key:value` parameters passed to the workload.
        #[clap(value_parser, last = true)]
        params: Vec<String>,
    },
}

#[derive(Debug, Clone)]
pub struct LocalJob {
    pub input: String,
    pub workload: String,
    pub output: PathBuf,
    pub n_reduce: u32,
    pub params: Option<InitParams>,
}

impl From<Commands> for LocalJob {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Submit {
                input,
                workload,
                output,
                n_reduce,
                params,
            } => Self {
                input,
                workload,
                output: PathBuf::from(output),
                n_reduce,
                params: (!params.is_empty()).then(|| InitParams::from_text(&params.join(" "))),
            },
        }
    }
}

/// Runs `job` to completion and returns the reduce output files.
///
/// The output directory is locked for the duration of the run, so two
/// jobs writing the same directory fail fast instead of interleaving.
pub fn run(job: &LocalJob) -> Result<Vec<PathBuf>> {
    anyhow::ensure!(job.n_reduce > 0, "n_reduce must be positive");
    let workload = workload::named(&job.workload)?;

    std::fs::create_dir_all(&job.output)
        .with_context(|| format!("creating {}", job.output.display()))?;
    lock::acquire(&job.output).with_context(|| format!("locking {}", job.output.display()))?;
    let result = engine::perform_map(job, &workload)
        .and_then(|buckets| engine::perform_reduce(job, &workload, buckets));
    let released = lock::release(&job.output);

    let outputs = result?;
    released?;
    info!(workload = %job.workload, reducers = job.n_reduce, "standalone job done");
    Ok(outputs)
}
