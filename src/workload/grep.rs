//! Line search.
//!
//! Takes one parameter, `term`. Map emits `(term, [line_no, line])` for every
//! input line containing the term, numbering lines from 1 within the shard.
//! Reduce writes `term:line_no:: line`, in line order.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::codec::TsvInternal;
use crate::job::{InitParams, Job, Lines, RunSummary, TextLines};
use crate::{KeyValue, MapOutput, Mapper, ReduceOutput, Reducer, Values};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GrepParams {
    pub term: String,
}

#[derive(Debug, Default)]
pub struct Grep {
    term: String,
    line_no: u64,
}

impl Grep {
    fn take_term(&mut self, params: Option<&GrepParams>) -> Result<()> {
        self.term = params.context("grep needs a `term` parameter")?.term.clone();
        Ok(())
    }
}

impl Mapper<GrepParams> for Grep {
    type Input = String;
    type Value = Vec<String>;

    fn init(&mut self, params: Option<&GrepParams>) -> Result<()> {
        self.take_term(params)
    }

    fn map(&mut self, line: String) -> MapOutput<'_, Vec<String>> {
        self.line_no += 1;
        if !line.contains(&self.term) {
            return Ok(Box::new(std::iter::empty()));
        }
        let kv = KeyValue::new(self.term.clone(), vec![self.line_no.to_string(), line]);
        Ok(Box::new(std::iter::once(Ok(kv))))
    }
}

impl Reducer<GrepParams> for Grep {
    type Value = Vec<String>;
    type Output = String;

    fn init(&mut self, params: Option<&GrepParams>) -> Result<()> {
        self.take_term(params)
    }

    fn reduce<'a>(
        &'a mut self,
        key: &'a str,
        values: Values<'a, Vec<String>>,
    ) -> ReduceOutput<'a, String> {
        // The shuffle sorts line numbers as text.
        let mut hits = values
            .filter_map(|fields| {
                let (line_no, rest) = fields.split_first()?;
                Some((line_no.parse::<u64>().ok()?, rest.join("\t")))
            })
            .collect::<Vec<_>>();
        hits.sort_by_key(|(line_no, _)| *line_no);
        Ok(Box::new(
            hits.into_iter()
                .map(move |(line_no, line)| Ok(format!("{key}:{line_no}:: {line}"))),
        ))
    }
}

pub fn map(params: Option<InitParams>, input: &mut dyn BufRead, output: &mut dyn Write) -> Result<RunSummary> {
    Job::<GrepParams>::map(params)?.run_map(
        &mut Grep::default(),
        TextLines::new(input),
        &TsvInternal,
        output,
    )
}

pub fn reduce(
    params: Option<InitParams>,
    rid: u32,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> Result<RunSummary> {
    Job::<GrepParams>::reduce(rid, params)?.run_reduce(
        &mut Grep::default(),
        input,
        TsvInternal,
        &Lines,
        output,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn term(t: &str) -> Option<InitParams> {
        Some(InitParams::from_text(&format!("term:{t}")))
    }

    #[test]
    fn map_emits_matching_lines() {
        let mut out = Vec::new();
        let input = "a needle\nhay\nneedle\tand tab\n";
        let summary = map(term("needle"), &mut Cursor::new(input), &mut out).unwrap();
        assert_eq!(summary.inputs, 3);
        assert_eq!(summary.outputs, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "needle\t1\ta needle\nneedle\t3\tneedle\tand tab\n"
        );
    }

    #[test]
    fn reduce_orders_by_line_number() {
        let sorted = "x\t10\tten x\nx\t2\ttwo x\tmore\n";
        let mut out = Vec::new();
        reduce(term("x"), 0, &mut Cursor::new(sorted), &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "x:2:: two x\tmore\nx:10:: ten x\n"
        );
    }

    #[test]
    fn missing_term_fails_init() {
        let err = map(None, &mut Cursor::new("x\n"), &mut Vec::new()).unwrap_err();
        assert!(format!("{err:#}").contains("term"));
    }
}
