//! Reduce output formats and the output sinks.
//!
//! Reducers can also emit [`Armored`](crate::codec::Armored) key/value
//! pairs, which makes their output valid map input for a later job.

use std::fmt::{Display, Write as _};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bytes::{BufMut, BytesMut};

use crate::codec::RecordFormat;
use crate::error::Error;

/// Reduce output buffer size. Reduce output is expected to land on a shared
/// filesystem with large blocks, so it is written in big chunks.
pub const OUTPUT_BUFSIZE: usize = 4 * 1024 * 1024;

/// Default directory for reduce output, relative to the job directory.
pub const DEFAULT_OUTDIR: &str = "out";

/// One UTF-8 line per item. Items must not contain LF.
#[derive(Clone, Copy, Debug, Default)]
pub struct Lines;

impl<T: Display> RecordFormat<T> for Lines {
    fn encode_into(&self, item: &T, buf: &mut BytesMut) -> Result<(), Error> {
        write!(buf, "{item}").map_err(|_| io::Error::other("formatting output item"))?;
        buf.put_u8(b'\n');
        Ok(())
    }
}

/// Tab-separated fields, one row per item.
#[derive(Clone, Copy, Debug, Default)]
pub struct Tsv;

impl<T: Display> RecordFormat<Vec<T>> for Tsv {
    fn encode_into(&self, item: &Vec<T>, buf: &mut BytesMut) -> Result<(), Error> {
        for (i, field) in item.iter().enumerate() {
            if i > 0 {
                buf.put_u8(b'\t');
            }
            write!(buf, "{field}").map_err(|_| io::Error::other("formatting output row"))?;
        }
        buf.put_u8(b'\n');
        Ok(())
    }
}

/// Standard output for map records.
///
/// Each record is written with a single `write_all` as soon as it is
/// produced; nothing is batched.
pub fn open_map_output() -> io::Stdout {
    io::stdout()
}

/// Path of reducer `rid`'s output file under `outdir`.
pub fn reduce_output_path(outdir: impl AsRef<Path>, rid: u32) -> PathBuf {
    outdir.as_ref().join(rid.to_string())
}

/// Creates `<outdir>/<rid>` behind an [`OUTPUT_BUFSIZE`] buffer.
pub fn open_reduce_output(outdir: impl AsRef<Path>, rid: u32) -> Result<io::BufWriter<File>> {
    let outdir = outdir.as_ref();
    fs::create_dir_all(outdir)
        .with_context(|| format!("creating output directory {}", outdir.display()))?;
    let path = reduce_output_path(outdir, rid);
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    Ok(io::BufWriter::with_capacity(OUTPUT_BUFSIZE, file))
}
