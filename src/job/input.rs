//! Map input adapters.
//!
//! Each adapter wraps a [`BufRead`] and yields one map input item at a
//! time, reading no further ahead than the current line.

use std::io::BufRead;
use std::marker::PhantomData;

use anyhow::{Context, Result};
use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::codec::{Armored, RecordDecoder};
use crate::utils::{read_line, split_first_tab, string_from_bytes};
use crate::KeyValue;

/// Raw byte lines, LF removed.
pub struct RawLines<R> {
    reader: R,
}

impl<R: BufRead> RawLines<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> Iterator for RawLines<R> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        read_line(&mut self.reader)
            .context("reading map input")
            .transpose()
    }
}

/// UTF-8 text lines, LF removed. Invalid UTF-8 is an error.
pub struct TextLines<R> {
    lines: RawLines<R>,
    line_no: u64,
}

impl<R: BufRead> TextLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: RawLines::new(reader),
            line_no: 0,
        }
    }
}

impl<R: BufRead> Iterator for TextLines<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.lines.next()?;
        self.line_no += 1;
        let line_no = self.line_no;
        Some(line.and_then(|l| {
            string_from_bytes(l).with_context(|| format!("map input line {line_no} is not UTF-8"))
        }))
    }
}

/// A sequence of armored key/value records, such as the output of another
/// job. Keys need not be unique or sorted.
pub struct KvLines<R, V> {
    lines: RawLines<R>,
    decoder: Armored<V>,
    _value: PhantomData<fn() -> V>,
}

impl<R: BufRead, V: DeserializeOwned> KvLines<R, V> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: RawLines::new(reader),
            decoder: Armored::new(),
            _value: PhantomData,
        }
    }
}

impl<R: BufRead, V: DeserializeOwned> Iterator for KvLines<R, V> {
    type Item = Result<KeyValue<V>>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = match self.lines.next()? {
            Ok(line) => line,
            Err(e) => return Some(Err(e)),
        };
        let (key, value) = split_first_tab(&line);
        Some(self.decode(key, value))
    }
}

impl<R, V: DeserializeOwned> KvLines<R, V> {
    fn decode(&self, key: Bytes, value: Option<Bytes>) -> Result<KeyValue<V>> {
        // Armored keys and values never decode to `None`.
        let key = self.decoder.decode_key(key)?.unwrap_or_default();
        let value = self
            .decoder
            .decode_value(value)
            .with_context(|| format!("decoding value for key {key:?}"))?
            .context("empty value")?;
        Ok(KeyValue { key, value })
    }
}

/// Tab-separated UTF-8 text: each line split on TAB, nothing more.
pub struct TsvLines<R> {
    lines: TextLines<R>,
}

impl<R: BufRead> TsvLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: TextLines::new(reader),
        }
    }
}

impl<R: BufRead> Iterator for TsvLines<R> {
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.lines.next()?;
        Some(line.map(|l| l.split('\t').map(str::to_string).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode, RecordFormat};
    use bytes::BytesMut;
    use std::io::Cursor;

    #[test]
    fn raw_and_text_lines() {
        let raw: Vec<Bytes> = RawLines::new(Cursor::new(b"a\n\xff\n".to_vec()))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(raw, vec![Bytes::from_static(b"a"), Bytes::from_static(b"\xff")]);

        let mut text = TextLines::new(Cursor::new(b"ok\n\xff\n".to_vec()));
        assert_eq!(text.next().unwrap().unwrap(), "ok");
        let err = text.next().unwrap().unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn kv_lines_read_back_armored_records() {
        let mut buf = BytesMut::new();
        let format = Armored::new();
        for kv in [KeyValue::new("b", vec![1, 2]), KeyValue::new("a", vec![]), KeyValue::new("b", vec![3])] {
            format.encode_into(&kv, &mut buf).unwrap();
        }
        let items: Vec<KeyValue<Vec<i32>>> = KvLines::new(Cursor::new(buf.to_vec()))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(items[0], KeyValue::new("b", vec![1, 2]));
        assert_eq!(items[1], KeyValue::new("a", vec![]));
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn kv_lines_reject_malformed_values() {
        let mut input = b"k\t".to_vec();
        input.extend_from_slice(&encode(&1).unwrap());
        input.extend_from_slice(b"\nk\t@@@\n");
        let mut items = KvLines::<_, i32>::new(Cursor::new(input));
        assert_eq!(items.next().unwrap().unwrap().value, 1);
        let err = items.next().unwrap().unwrap_err();
        let wire = err.downcast_ref::<crate::Error>().unwrap();
        assert!(wire.is_wire_format());
    }

    #[test]
    fn tsv_lines_split_on_tabs() {
        let rows: Vec<Vec<String>> = TsvLines::new(Cursor::new("a\tb\t\nc\n"))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rows, vec![vec!["a", "b", ""], vec!["c"]]);
    }
}
