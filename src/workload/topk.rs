//! Highest scores per key.
//!
//! Input is tab-separated `key score label` rows. Rows whose score is not
//! a finite number are skipped. Reduce keeps the `k` best `(score, label)`
//! pairs for each key (parameter `k`, default 3) and writes them as an
//! armored record, best first, so the output can feed another job.

use std::io::{BufRead, Write};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::Armored;
use crate::job::{InitParams, Job, RunSummary, TsvLines};
use crate::topk::{BoundedTopK, TieBreakSeed};
use crate::{KeyValue, MapOutput, Mapper, ReduceOutput, Reducer, Values};

pub const DEFAULT_K: usize = 3;

fn default_k() -> usize {
    DEFAULT_K
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopParams {
    #[serde(default = "default_k")]
    pub k: usize,
}

pub type Scored = (f64, String);

#[derive(Debug)]
pub struct TopScores {
    k: usize,
    seed: TieBreakSeed,
}

impl Default for TopScores {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            seed: TieBreakSeed::current(),
        }
    }
}

impl Mapper<TopParams> for TopScores {
    type Input = Vec<String>;
    type Value = Scored;

    fn map(&mut self, row: Vec<String>) -> MapOutput<'_, Scored> {
        let [key, score, label, ..] = row.as_slice() else {
            debug!(fields = row.len(), "skipping short row");
            return Ok(Box::new(std::iter::empty()));
        };
        match score.parse::<f64>() {
            Ok(score) if score.is_finite() => {
                let kv = KeyValue::new(key.clone(), (score, label.clone()));
                Ok(Box::new(std::iter::once(Ok(kv))))
            }
            _ => {
                debug!(%key, %score, "skipping row without a usable score");
                Ok(Box::new(std::iter::empty()))
            }
        }
    }
}

impl Reducer<TopParams> for TopScores {
    type Value = Scored;
    type Output = KeyValue<Vec<Scored>>;

    fn init(&mut self, params: Option<&TopParams>) -> Result<()> {
        self.k = params.map_or(DEFAULT_K, |p| p.k);
        Ok(())
    }

    fn reduce<'a>(
        &'a mut self,
        key: &'a str,
        values: Values<'a, Scored>,
    ) -> ReduceOutput<'a, KeyValue<Vec<Scored>>> {
        let mut top = BoundedTopK::with_seed(self.k, self.seed)?;
        for (score, label) in values {
            top.insert(score, label);
        }
        let best = KeyValue::new(key, top.into_sorted_vec());
        Ok(Box::new(std::iter::once(Ok(best))))
    }
}

pub fn map(params: Option<InitParams>, input: &mut dyn BufRead, output: &mut dyn Write) -> Result<RunSummary> {
    Job::<TopParams>::map(params)?.run_map(
        &mut TopScores::default(),
        TsvLines::new(input),
        &Armored::new(),
        output,
    )
}

pub fn reduce(
    params: Option<InitParams>,
    rid: u32,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> Result<RunSummary> {
    Job::<TopParams>::reduce(rid, params)?.run_reduce(
        &mut TopScores::default(),
        input,
        Armored::<Scored>::new(),
        &Armored::new(),
        output,
    )
}
