use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::PathBuf;

use anyhow::{Context, Result};
use bytes::Bytes;
use dashmap::DashMap;
use glob::glob;
use itertools::Itertools;
use tracing::debug;

use crate::hash::reducer_for;
use crate::job::open_reduce_output;
use crate::standalone::LocalJob;
use crate::utils::split_first_tab;
use crate::workload::Workload;

// types related to this engine
type BucketIndex = u32;
type Buckets = DashMap<BucketIndex, Vec<Bytes>>;

/// Runs the map entry over every input file and partitions the records it
/// writes. Records are kept as raw lines without the LF.
pub fn perform_map(job: &LocalJob, workload: &Workload) -> Result<Buckets> {
    let input_files = glob(&job.input).with_context(|| format!("bad input glob {:?}", job.input))?;
    let buckets = Buckets::new();
    for pathspec in input_files {
        let pathspec = pathspec?;
        let file = File::open(&pathspec).with_context(|| format!("opening {}", pathspec.display()))?;
        let mut reader = BufReader::new(file);
        let mut mapped = Vec::new();
        let summary = (workload.map_fn)(job.params.clone(), &mut reader, &mut mapped)
            .with_context(|| format!("mapping {}", pathspec.display()))?;
        debug!(input = %pathspec.display(), records = summary.outputs, "mapped");

        let mapped = Bytes::from(mapped);
        for line in mapped.split(|&b| b == b'\n').filter(|l| !l.is_empty()) {
            let line = mapped.slice_ref(line);
            let (key, _) = split_first_tab(&line);
            let bucket_no = reducer_for(&key, job.n_reduce);
            buckets.entry(bucket_no).or_default().push(line);
        }
    }
    Ok(buckets)
}

/// Sorts each bucket by key and runs the reduce entry on it. Every reducer
/// runs, so each `<output>/<rid>` exists even when its bucket is empty.
pub fn perform_reduce(job: &LocalJob, workload: &Workload, buckets: Buckets) -> Result<Vec<PathBuf>> {
    let mut outputs = Vec::with_capacity(job.n_reduce as usize);
    for rid in 0..job.n_reduce {
        let bucket = buckets.remove(&rid).map(|(_, lines)| lines).unwrap_or_default();
        // Stable, so values of one key keep their map order.
        let mut sorted = Vec::new();
        for line in bucket.into_iter().sorted_by(|a, b| split_first_tab(a).0.cmp(&split_first_tab(b).0)) {
            sorted.extend_from_slice(&line);
            sorted.push(b'\n');
        }

        let mut out = open_reduce_output(&job.output, rid)?;
        (workload.reduce_fn)(job.params.clone(), rid, &mut Cursor::new(sorted), &mut out)
            .with_context(|| format!("reducer {rid}"))?;
        outputs.push(crate::job::reduce_output_path(&job.output, rid));
    }
    Ok(outputs)
}
