//! The job runner: one map or reduce pass per process.
//!
//! A [`Job`] is built once from the process's initialization parameters and
//! consumed by [`Job::run_map`] or [`Job::run_reduce`]. Both walk the same
//! phases, never revisiting one:
//!
//! ```text
//! Init -> StreamsOpen -> Running -> Drained -> Closed
//! ```
//!
//! What the streams contain is decided by strategy objects passed in by the
//! caller: an input adapter from [`input`] (map) or a
//! [`RecordDecoder`] (reduce), and a [`RecordFormat`] for the output. The
//! output is flushed before it is dropped on every exit path, including
//! failures in user code.
//!
//! Mappers and reducers are not thread-safe; run each in its own process.
//!
//! # Group lifetime
//!
//! A reducer receives each key group's values as an iterator that borrows
//! the input stream. It cannot be stored past the `reduce` call, and any
//! values left unread are skipped before the next group starts.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use bytes::BytesMut;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::codec::{RecordDecoder, RecordFormat};
use crate::{KeyValue, Mapper, Reducer};

mod group;
pub mod input;
mod output;
mod params;

pub use group::Groups;
pub use input::{KvLines, RawLines, TextLines, TsvLines};
pub use output::{
    open_map_output, open_reduce_output, reduce_output_path, Lines, Tsv, DEFAULT_OUTDIR,
    OUTPUT_BUFSIZE,
};
pub use params::{int_float_pass, parse_param_text, InitParams, ParamMap};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Map,
    /// Reduce, writing the output of reducer `rid`.
    Reduce { rid: u32 },
}

/// Lifecycle of a job. Ordered; a job only moves forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Init,
    StreamsOpen,
    Running,
    Drained,
    Closed,
}

/// Counts reported when a run completes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Map items or reduce records read.
    pub inputs: u64,
    /// Key groups reduced. Always 0 for map.
    pub groups: u64,
    /// Records or items written.
    pub outputs: u64,
}

/// One map or reduce pass.
///
/// `P` is the structure the initialization parameters decode into.
#[derive(Debug)]
pub struct Job<P = ParamMap> {
    mode: Mode,
    params: Option<P>,
    phase: Phase,
}

impl<P: DeserializeOwned> Job<P> {
    /// A map job.
    pub fn map(params: Option<InitParams>) -> Result<Self> {
        Self::new(Mode::Map, params)
    }

    /// A reduce job for reducer `rid`.
    pub fn reduce(rid: u32, params: Option<InitParams>) -> Result<Self> {
        Self::new(Mode::Reduce { rid }, params)
    }

    /// Decodes `params` up front, so user hooks only ever see the resolved
    /// structure.
    pub fn new(mode: Mode, params: Option<InitParams>) -> Result<Self> {
        let params = params
            .map(InitParams::resolve)
            .transpose()
            .context("decoding job parameters")?;
        Ok(Self {
            mode,
            params,
            phase: Phase::Init,
        })
    }
}

impl<P> Job<P> {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn params(&self) -> Option<&P> {
        self.params.as_ref()
    }

    /// Reducer id, for reduce jobs.
    pub fn rid(&self) -> Option<u32> {
        match self.mode {
            Mode::Reduce { rid } => Some(rid),
            Mode::Map => None,
        }
    }

    /// Where this reduce job's output goes under `outdir`.
    pub fn reduce_output_path(&self, outdir: impl AsRef<Path>) -> Option<PathBuf> {
        self.rid().map(|rid| reduce_output_path(outdir, rid))
    }

    /// Runs the map pass: every item from `input` goes through `mapper`, and
    /// every pair it yields is written to `out` at once.
    ///
    /// `out` should be unbuffered; it usually feeds the shuffle through a
    /// pipe.
    pub fn run_map<M, I, F, W>(
        mut self,
        mapper: &mut M,
        input: I,
        format: &F,
        mut out: W,
    ) -> Result<RunSummary>
    where
        M: Mapper<P>,
        I: IntoIterator<Item = Result<M::Input>>,
        F: RecordFormat<KeyValue<M::Value>>,
        W: Write,
    {
        ensure!(self.mode == Mode::Map, "cannot run map in {:?} mode", self.mode);
        self.enter(Phase::StreamsOpen);
        let result = self.drive_map(mapper, input, format, &mut out);
        self.finish(result, out)
    }

    /// Runs the reduce pass over `input`, which must be grouped by key.
    ///
    /// `decoder` turns records into values; `format` writes what the
    /// reducer yields.
    pub fn run_reduce<Rd, R, D, F, W>(
        mut self,
        reducer: &mut Rd,
        input: R,
        decoder: D,
        format: &F,
        mut out: W,
    ) -> Result<RunSummary>
    where
        Rd: Reducer<P>,
        R: BufRead,
        D: RecordDecoder<Rd::Value>,
        F: RecordFormat<Rd::Output>,
        W: Write,
    {
        ensure!(
            matches!(self.mode, Mode::Reduce { .. }),
            "cannot run reduce in {:?} mode",
            self.mode
        );
        self.enter(Phase::StreamsOpen);
        let mut groups = Groups::new(input, decoder);
        let result = self.drive_reduce(reducer, &mut groups, format, &mut out);
        self.finish(result, out)
    }

    fn drive_map<M, I, F, W>(
        &mut self,
        mapper: &mut M,
        input: I,
        format: &F,
        out: &mut W,
    ) -> Result<RunSummary>
    where
        M: Mapper<P>,
        I: IntoIterator<Item = Result<M::Input>>,
        F: RecordFormat<KeyValue<M::Value>>,
        W: Write,
    {
        mapper.init(self.params.as_ref()).context("map init")?;
        self.enter(Phase::Running);

        let mut summary = RunSummary::default();
        let mut buf = BytesMut::new();
        for item in input {
            let item = item?;
            summary.inputs += 1;
            for kv in mapper.map(item)? {
                write_item(format, &kv?, &mut buf, out).context("writing map output")?;
                summary.outputs += 1;
            }
        }
        self.enter(Phase::Drained);
        Ok(summary)
    }

    fn drive_reduce<Rd, R, D, F, W>(
        &mut self,
        reducer: &mut Rd,
        groups: &mut Groups<R, D, Rd::Value>,
        format: &F,
        out: &mut W,
    ) -> Result<RunSummary>
    where
        Rd: Reducer<P>,
        R: BufRead,
        D: RecordDecoder<Rd::Value>,
        F: RecordFormat<Rd::Output>,
        W: Write,
    {
        reducer.init(self.params.as_ref()).context("reduce init")?;
        self.enter(Phase::Running);

        let mut summary = RunSummary::default();
        let mut buf = BytesMut::new();
        while let Some(key) = groups.next_key()? {
            summary.groups += 1;
            let reduced =
                reduce_group::<P, _, _, _, _, _>(reducer, &key, groups, format, &mut buf, out);
            // A decode error that stopped the values explains whatever the
            // reducer did next.
            groups.check()?;
            summary.outputs += reduced?;
        }
        summary.inputs = groups.records();
        if groups.skipped() > 0 {
            debug!(skipped = groups.skipped(), "dropped groups with undecodable keys");
        }
        if groups.dropped() > 0 {
            debug!(dropped = groups.dropped(), "dropped records with undecodable values");
        }
        self.enter(Phase::Drained);
        Ok(summary)
    }

    fn finish<W: Write>(mut self, result: Result<RunSummary>, mut out: W) -> Result<RunSummary> {
        let flushed = out.flush().context("flushing output");
        drop(out);
        self.enter(Phase::Closed);

        let summary = result?;
        flushed?;
        info!(
            mode = ?self.mode,
            inputs = summary.inputs,
            groups = summary.groups,
            outputs = summary.outputs,
            "job finished"
        );
        Ok(summary)
    }

    fn enter(&mut self, next: Phase) {
        debug_assert!(next > self.phase, "{:?} -> {:?}", self.phase, next);
        debug!(from = ?self.phase, to = ?next, "job phase");
        self.phase = next;
    }
}

/// Runs one reduce call and writes what it yields. Returns the number of
/// items written.
fn reduce_group<P, Rd, R, D, F, W>(
    reducer: &mut Rd,
    key: &str,
    groups: &mut Groups<R, D, Rd::Value>,
    format: &F,
    buf: &mut BytesMut,
    out: &mut W,
) -> Result<u64>
where
    Rd: Reducer<P>,
    R: BufRead,
    D: RecordDecoder<Rd::Value>,
    F: RecordFormat<Rd::Output>,
    W: Write,
{
    let items = reducer
        .reduce(key, groups.values())
        .with_context(|| format!("reducing key {key:?}"))?;
    let mut written = 0;
    for item in items {
        write_item(format, &item?, buf, out).context("writing reduce output")?;
        written += 1;
    }
    Ok(written)
}

fn write_item<T, F, W>(format: &F, item: &T, buf: &mut BytesMut, out: &mut W) -> Result<()>
where
    F: RecordFormat<T>,
    W: Write,
{
    buf.clear();
    format.encode_into(item, buf)?;
    out.write_all(buf)?;
    Ok(())
}
