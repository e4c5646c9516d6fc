//! Error kinds raised by the protocol primitives.
//!
//! The runner and the sample workloads work in [`anyhow::Result`]; these
//! typed errors travel inside it and can be recovered with
//! [`anyhow::Error::downcast_ref`].

use std::io;
use std::string::FromUtf8Error;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A value field is not valid base64.
    #[error("malformed armored value: {0}")]
    Armor(#[from] base64::DecodeError),

    /// A value field decoded from base64 but not into the expected payload.
    #[error("malformed value payload: {0}")]
    Payload(#[source] serde_json::Error),

    /// A record key is not UTF-8 on a path that requires it.
    #[error("record key is not valid UTF-8: {0}")]
    KeyEncoding(#[from] FromUtf8Error),

    /// A value could not be serialized into its canonical form.
    #[error("cannot encode value: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("limit {0} is not greater than zero")]
    InvalidLimit(usize),

    #[error("cannot merge queues with different limits ({left} != {right})")]
    LimitMismatch { left: usize, right: usize },

    #[error("can't acquire lock '{0}'")]
    LockHeld(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// True for errors that mean the upstream stream disagrees with this
    /// protocol. These abort a run.
    pub fn is_wire_format(&self) -> bool {
        matches!(
            self,
            Error::Armor(_) | Error::Payload(_) | Error::KeyEncoding(_)
        )
    }

    /// True for caller mistakes that are reported immediately and never
    /// retried.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidLimit(_) | Error::LimitMismatch { .. } | Error::LockHeld(_)
        )
    }
}
