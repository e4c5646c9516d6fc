//! Splitting sorted reducer input into key groups.
//!
//! Reducer input must already be sorted (or at least grouped) by key; that
//! is the shuffle's job. [`Groups`] only watches for the raw key bytes to
//! change. It holds one record of lookahead and never buffers a whole group.

use std::io::BufRead;
use std::marker::PhantomData;

use anyhow::{Context, Result};
use bytes::Bytes;
use tracing::debug;

use crate::codec::RecordDecoder;
use crate::utils::{read_line, split_first_tab};
use crate::Values;

struct RawRecord {
    key: Bytes,
    value: Option<Bytes>,
}

/// Key groups over a stream of records.
pub struct Groups<R, D, V> {
    reader: R,
    decoder: D,
    lookahead: Option<RawRecord>,
    // Raw key of the group being handed out, if any.
    current: Option<Bytes>,
    error: Option<anyhow::Error>,
    records: u64,
    skipped: u64,
    dropped: u64,
    _value: PhantomData<fn() -> V>,
}

impl<R: BufRead, D: RecordDecoder<V>, V> Groups<R, D, V> {
    pub fn new(reader: R, decoder: D) -> Self {
        Self {
            reader,
            decoder,
            lookahead: None,
            current: None,
            error: None,
            records: 0,
            skipped: 0,
            dropped: 0,
            _value: PhantomData,
        }
    }

    /// Advances to the next group and returns its key, or `None` at end of
    /// input. Unread values of the previous group are skipped.
    ///
    /// Groups whose key the decoder rejects are dropped whole.
    pub fn next_key(&mut self) -> Result<Option<String>> {
        self.check()?;
        self.skip_current()?;
        loop {
            let Some(record) = self.take_record()? else {
                return Ok(None);
            };
            let raw_key = record.key.clone();
            self.lookahead = Some(record);
            self.current = Some(raw_key.clone());
            match self.decoder.decode_key(raw_key)? {
                Some(key) => return Ok(Some(key)),
                None => {
                    debug!(key = ?self.current, "skipping group with undecodable key");
                    self.skip_current()?;
                    self.skipped += 1;
                }
            }
        }
    }

    /// Lazy values of the current group.
    ///
    /// The returned iterator stops at the group boundary, at end of input,
    /// or at the first error; call [`check`](Self::check) afterwards to
    /// learn which.
    pub fn values(&mut self) -> Values<'_, V> {
        Box::new(GroupValues { groups: self })
    }

    /// Returns the error that stopped a value iterator, if any.
    pub fn check(&mut self) -> Result<()> {
        match self.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Number of records read so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Number of groups dropped because of their key.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Number of records dropped from a kept group because the decoder
    /// rejected their value.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn next_value(&mut self) -> Option<V> {
        if self.error.is_some() {
            return None;
        }
        loop {
            let record = match self.take_record() {
                Ok(Some(record)) => record,
                Ok(None) => return None,
                Err(e) => {
                    self.error = Some(e);
                    return None;
                }
            };
            if self.current.as_ref() != Some(&record.key) {
                self.lookahead = Some(record);
                return None;
            }
            match self.decoder.decode_value(record.value) {
                Ok(Some(value)) => return Some(value),
                Ok(None) => {
                    debug!(key = ?record.key, "skipping record with undecodable value");
                    self.dropped += 1;
                }
                Err(e) => {
                    self.error = Some(
                        anyhow::Error::new(e).context(format!("decoding value for key {:?}", record.key)),
                    );
                    return None;
                }
            }
        }
    }

    fn skip_current(&mut self) -> Result<()> {
        let Some(current) = self.current.take() else {
            return Ok(());
        };
        while let Some(record) = self.take_record()? {
            if record.key != current {
                self.lookahead = Some(record);
                break;
            }
        }
        Ok(())
    }

    fn take_record(&mut self) -> Result<Option<RawRecord>> {
        if let Some(record) = self.lookahead.take() {
            return Ok(Some(record));
        }
        let line = read_line(&mut self.reader).context("reading reduce input")?;
        Ok(line.map(|line| {
            self.records += 1;
            let (key, value) = split_first_tab(&line);
            RawRecord { key, value }
        }))
    }
}

struct GroupValues<'a, R, D, V> {
    groups: &'a mut Groups<R, D, V>,
}

impl<R: BufRead, D: RecordDecoder<V>, V> Iterator for GroupValues<'_, R, D, V> {
    type Item = V;

    fn next(&mut self) -> Option<V> {
        self.groups.next_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Armored, RecordFormat, TsvInternal};
    use crate::KeyValue;
    use bytes::BytesMut;
    use std::io::Cursor;

    fn armored(pairs: &[(&str, i64)]) -> Cursor<Vec<u8>> {
        let mut buf = BytesMut::new();
        for (k, v) in pairs {
            Armored::new().encode_into(&KeyValue::new(*k, *v), &mut buf).unwrap();
        }
        Cursor::new(buf.to_vec())
    }

    fn collect<R: BufRead, D: RecordDecoder<V>, V>(
        groups: &mut Groups<R, D, V>,
    ) -> Vec<(String, Vec<V>)> {
        let mut out = Vec::new();
        while let Some(key) = groups.next_key().unwrap() {
            let values = groups.values().collect();
            groups.check().unwrap();
            out.push((key, values));
        }
        out
    }

    #[test]
    fn groups_follow_key_changes() {
        let input = armored(&[("1", -1), ("2", -2), ("2", -3), ("3", -4), ("3", -5), ("3", -6)]);
        let mut groups = Groups::new(input, Armored::<i64>::new());
        let got = collect(&mut groups);
        assert_eq!(
            got,
            vec![
                ("1".to_string(), vec![-1]),
                ("2".to_string(), vec![-2, -3]),
                ("3".to_string(), vec![-4, -5, -6]),
            ]
        );
    }

    #[test]
    fn unread_values_are_skipped() {
        let input = armored(&[("a", 1), ("a", 2), ("a", 3), ("b", 4)]);
        let mut groups = Groups::new(input, Armored::<i64>::new());

        assert_eq!(groups.next_key().unwrap().as_deref(), Some("a"));
        assert_eq!(groups.values().next(), Some(1));
        assert_eq!(groups.next_key().unwrap().as_deref(), Some("b"));
        assert_eq!(groups.values().collect::<Vec<_>>(), vec![4]);
        assert_eq!(groups.next_key().unwrap(), None);
        assert_eq!(groups.records(), 4);
    }

    #[test]
    fn empty_input_has_no_groups() {
        let mut groups = Groups::new(Cursor::new(Vec::new()), Armored::<i64>::new());
        assert_eq!(groups.next_key().unwrap(), None);
    }

    #[test]
    fn malformed_value_stops_the_run() {
        let mut input = armored(&[("a", 1)]).into_inner();
        input.extend_from_slice(b"a\t!!!\nb\tMQ==\n");
        let mut groups = Groups::new(Cursor::new(input), Armored::<i64>::new());

        assert_eq!(groups.next_key().unwrap().as_deref(), Some("a"));
        assert_eq!(groups.values().collect::<Vec<_>>(), vec![1]);
        let err = groups.check().unwrap_err();
        assert!(err.downcast_ref::<crate::Error>().unwrap().is_wire_format());
    }

    #[test]
    fn tsv_groups_skip_foreign_keys() {
        let input = b"a\t1\tx\na\t2\tx\n\xff\t9\n\xff\t9\nb\t3\n".to_vec();
        let mut groups = Groups::new(Cursor::new(input), TsvInternal);
        let got = collect(&mut groups);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].0, "a");
        assert_eq!(got[0].1, vec![vec!["1", "x"], vec!["2", "x"]]);
        assert_eq!(got[1], ("b".to_string(), vec![vec!["3".to_string()]]));
        assert_eq!(groups.skipped(), 1);
        assert_eq!(groups.dropped(), 0);
    }

    #[test]
    fn tsv_value_drops_are_counted_apart_from_key_skips() {
        let input = b"a	1
a	\xff
a	2
\xfe	3
".to_vec();
        let mut groups = Groups::new(Cursor::new(input), TsvInternal);
        let got = collect(&mut groups);
        assert_eq!(got, vec![("a".to_string(), vec![vec!["1".to_string()], vec!["2".to_string()]])]);
        assert_eq!(groups.dropped(), 1);
        assert_eq!(groups.skipped(), 1);
        assert_eq!(groups.records(), 4);
    }
}
