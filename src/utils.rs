//! Small byte and string helpers shared by the codec and the runner.
//!

use std::io::{self, BufRead};

use bytes::Bytes;

/// Read an entire [`Bytes`] slice into a [`String`].
///
/// Returns an error if the slice contains invalid UTF-8.
pub fn string_from_bytes(buf: Bytes) -> Result<String, std::string::FromUtf8Error> {
    String::from_utf8(buf.to_vec())
}

/// Reads one LF-terminated line, without the LF.
///
/// Returns `None` at end of input. A final line with no LF is still
/// returned.
pub fn read_line<R: BufRead + ?Sized>(reader: &mut R) -> io::Result<Option<Bytes>> {
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf)? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    Ok(Some(Bytes::from(buf)))
}

/// Splits `line` at its first TAB into `(key, rest)`.
///
/// A line without a TAB is all key and has no rest.
pub fn split_first_tab(line: &Bytes) -> (Bytes, Option<Bytes>) {
    match line.iter().position(|&b| b == b'\t') {
        Some(i) => (line.slice(..i), Some(line.slice(i + 1..))),
        None => (line.clone(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_line_strips_lf_and_keeps_unterminated_tail() {
        let mut r = Cursor::new(b"a\tb\n\nlast".to_vec());
        assert_eq!(read_line(&mut r).unwrap(), Some(Bytes::from_static(b"a\tb")));
        assert_eq!(read_line(&mut r).unwrap(), Some(Bytes::new()));
        assert_eq!(read_line(&mut r).unwrap(), Some(Bytes::from_static(b"last")));
        assert_eq!(read_line(&mut r).unwrap(), None);
    }

    #[test]
    fn split_first_tab_only_splits_once() {
        let (k, rest) = split_first_tab(&Bytes::from_static(b"k\tv1\tv2"));
        assert_eq!(k, "k");
        assert_eq!(rest.unwrap(), "v1\tv2");

        let (k, rest) = split_first_tab(&Bytes::from_static(b"lonely"));
        assert_eq!(k, "lonely");
        assert!(rest.is_none());

        let (_, rest) = split_first_tab(&Bytes::from_static(b"k\t"));
        assert_eq!(rest.unwrap(), "");
    }
}
