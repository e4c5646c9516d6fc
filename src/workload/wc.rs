//! Word count.
//!
//! Map emits `(word, 1)` for every lowercased alphabetic run in a line;
//! reduce writes `word count` lines.

use std::io::{BufRead, Write};

use anyhow::Result;

use crate::codec::Armored;
use crate::job::{InitParams, Job, Lines, ParamMap, RunSummary, TextLines};
use crate::{KeyValue, MapOutput, Mapper, ReduceOutput, Reducer, Values};

#[derive(Debug, Default)]
pub struct WordCount;

impl Mapper for WordCount {
    type Input = String;
    type Value = u64;

    fn map(&mut self, line: String) -> MapOutput<'_, u64> {
        let words = line
            .split(|c: char| !c.is_alphabetic())
            .filter(|s| !s.is_empty())
            .map(|word| word.to_lowercase())
            .collect::<Vec<_>>();
        Ok(Box::new(words.into_iter().map(|word| Ok(KeyValue::new(word, 1)))))
    }
}

impl Reducer for WordCount {
    type Value = u64;
    type Output = String;

    fn reduce<'a>(&'a mut self, key: &'a str, values: Values<'a, u64>) -> ReduceOutput<'a, String> {
        let count: u64 = values.sum();
        Ok(Box::new(std::iter::once(Ok(format!("{key} {count}")))))
    }
}

pub fn map(params: Option<InitParams>, input: &mut dyn BufRead, output: &mut dyn Write) -> Result<RunSummary> {
    Job::<ParamMap>::map(params)?.run_map(&mut WordCount, TextLines::new(input), &Armored::new(), output)
}

pub fn reduce(
    params: Option<InitParams>,
    rid: u32,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> Result<RunSummary> {
    Job::<ParamMap>::reduce(rid, params)?.run_reduce(
        &mut WordCount,
        input,
        Armored::<u64>::new(),
        &Lines,
        output,
    )
}
