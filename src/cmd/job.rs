use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::job::{InitParams, DEFAULT_OUTDIR};

#[derive(Parser, Debug)]
#[command(version, about = "Run one map or reduce pass over stdin", long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Map stdin, writing records to stdout
    Map {
        /// Name of the workload
        #[arg(short, long)]
        workload: String,

        /// Whitespace-separated `key:value` parameters
        #[arg(short, long)]
        params: Option<String>,
    },
    /// Reduce key-sorted stdin into `<outdir>/<rid>`
    Reduce {
        /// Name of the workload
        #[arg(short, long)]
        workload: String,

        /// Reducer id
        #[arg(short, long)]
        rid: u32,

        /// Output directory
        #[arg(short, long, default_value = DEFAULT_OUTDIR)]
        outdir: PathBuf,

        /// Whitespace-separated `key:value` parameters
        #[arg(short, long)]
        params: Option<String>,
    },
}

impl Commands {
    pub fn workload(&self) -> &str {
        match self {
            Self::Map { workload, .. } | Self::Reduce { workload, .. } => workload,
        }
    }

    /// The parameter text, parsed. Absent text means no parameters.
    pub fn init_params(&self) -> Option<InitParams> {
        let (Self::Map { params, .. } | Self::Reduce { params, .. }) = self;
        params.as_deref().map(InitParams::from_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reduce() {
        let args = Args::try_parse_from(["mrp-job", "reduce", "-w", "wc", "--rid", "3"]).unwrap();
        assert_eq!(args.command.workload(), "wc");
        assert_eq!(args.command.init_params(), None);
        match args.command {
            Commands::Reduce { rid, outdir, .. } => {
                assert_eq!(rid, 3);
                assert_eq!(outdir, PathBuf::from("out"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_map_params() {
        let args =
            Args::try_parse_from(["mrp-job", "map", "-w", "grep", "--params", "term:fox"]).unwrap();
        let params = args.command.init_params().unwrap();
        assert_eq!(params.to_text(), "term:fox");
    }
}
