//! Converts workload names to actual map/reduce code.
//!
//! # Example
//!
//! To get the word count workload:
//! ```
//! # use anyhow::Result;
//! use mrpipe::workload;
//! # fn main() -> Result<()> {
//! let wc = workload::named("wc")?;
//! # let _ = wc;
//! # Ok(())
//! # }
//! ```

use std::io::{BufRead, Write};

use anyhow::{bail, Result};

use crate::job::{InitParams, RunSummary};

pub mod grep;
pub mod topk;
pub mod wc;

/// A map pass: parameters, input stream, output stream.
pub type MapFn = fn(Option<InitParams>, &mut dyn BufRead, &mut dyn Write) -> Result<RunSummary>;

/// A reduce pass: parameters, reducer id, sorted input stream, output stream.
pub type ReduceFn =
    fn(Option<InitParams>, u32, &mut dyn BufRead, &mut dyn Write) -> Result<RunSummary>;

/// Both halves of a named workload.
#[derive(Clone, Copy)]
pub struct Workload {
    pub map_fn: MapFn,
    pub reduce_fn: ReduceFn,
}

/// Gets the [`Workload`] named `name`.
///
/// Returns [`None`] if no workload with the given name was found.
pub fn try_named(name: &str) -> Option<Workload> {
    match name {
        "wc" => Some(Workload {
            map_fn: wc::map,
            reduce_fn: wc::reduce,
        }),
        "grep" => Some(Workload {
            map_fn: grep::map,
            reduce_fn: grep::reduce,
        }),
        "topk" => Some(Workload {
            map_fn: topk::map,
            reduce_fn: topk::reduce,
        }),
        _ => None,
    }
}

/// Gets the [`Workload`] named `name`.
///
/// Returns an [`anyhow::Error`] if no workload with the given name was found.
pub fn named(name: &str) -> Result<Workload> {
    match try_named(name) {
        Some(workload) => Ok(workload),
        None => bail!("No workload named `{}` found.", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup() {
        for name in ["wc", "grep", "topk"] {
            assert!(try_named(name).is_some(), "{name}");
        }
        assert!(try_named("mm-one").is_none());
        let err = named("nope").err().unwrap();
        assert!(err.to_string().contains("nope"));
    }
}
