//! A streaming map/reduce job protocol.
//!
//! Each mapper or reducer is a single process that reads records from one
//! byte stream, runs user logic, and writes records to another. Something
//! outside this crate launches those processes, assigns them shards, and
//! sorts map output by key before it reaches a reducer. This crate defines
//! what the processes agree on:
//!
//! * [`hash`]: the byte hash that routes a key to a reducer,
//! * [`codec`]: the line-oriented record format,
//! * [`job`]: the runner that drives one map or reduce pass,
//! * [`topk`]: a bounded, mergeable top-K structure for reduce logic,
//! * [`lock`]: an advisory lock built on atomic directory creation.
//!
//! [`workload`] bundles a few sample jobs, and [`standalone`] runs one on a
//! single machine with an in-memory sort standing in for the shuffle.

use serde::{Deserialize, Serialize};

pub mod cmd;
pub mod codec;
pub mod error;
pub mod hash;
pub mod job;
pub mod lock;
pub mod standalone;
pub mod topk;
pub mod utils;
pub mod workload;

pub use error::Error;
pub use job::{InitParams, Job, Mode, ParamMap, RunSummary};
pub use topk::{BoundedTopK, TieBreakSeed};

/////////////////////////////////////////////////////////////////////////////
// MapReduce application types
/////////////////////////////////////////////////////////////////////////////

/// The output of a map call.
///
/// There are 2 layers of [`anyhow::Result`]s here. The outer layer
/// accounts for errors that arise while creating the iterator.
/// The inner layer accounts for errors that occur during iteration.
///
/// This accomodates both batch (all keys emitted at once) and lazy
/// (keys only emitted when the iterator is consumed) map operations.
pub type MapOutput<'a, V> =
    anyhow::Result<Box<dyn Iterator<Item = anyhow::Result<KeyValue<V>>> + 'a>>;

/// The values of one key group, in input order.
///
/// The iterator borrows the reducer's input stream, so it cannot be kept
/// past the reduce call that received it. Values left unread are skipped.
pub type Values<'a, V> = Box<dyn Iterator<Item = V> + 'a>;

/// The output of a reduce call: zero or more items for the output format.
pub type ReduceOutput<'a, O> = anyhow::Result<Box<dyn Iterator<Item = anyhow::Result<O>> + 'a>>;

/// User map logic.
///
/// `P` is the parameter type the job was started with.
pub trait Mapper<P = ParamMap> {
    /// One item from the map input adapter.
    type Input;
    /// Value half of the emitted pairs.
    type Value;

    /// Called once, after the streams are open and before the first item.
    fn init(&mut self, _params: Option<&P>) -> anyhow::Result<()> {
        Ok(())
    }

    fn map(&mut self, item: Self::Input) -> MapOutput<'_, Self::Value>;
}

/// User reduce logic.
pub trait Reducer<P = ParamMap> {
    /// Values as decoded from the reducer input.
    type Value;
    /// Items handed to the output format.
    type Output;

    /// Called once, after the streams are open and before the first group.
    fn init(&mut self, _params: Option<&P>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once per key group with a lazy sequence of its values.
    fn reduce<'a>(
        &'a mut self,
        key: &'a str,
        values: Values<'a, Self::Value>,
    ) -> ReduceOutput<'a, Self::Output>;
}

/////////////////////////////////////////////////////////////////////////////
// Key-value pairs
/////////////////////////////////////////////////////////////////////////////

/// A single key-value pair.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct KeyValue<V> {
    /// The key. Must not contain TAB or LF.
    pub key: String,
    /// The value.
    pub value: V,
}

impl<V> KeyValue<V> {
    /// Construct a new key-value pair from the given key and value.
    pub fn new(key: impl Into<String>, value: V) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    /// Get the key of this key-value pair.
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the value of this key-value pair.
    #[inline]
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Consumes the key-value pair and returns the key.
    #[inline]
    pub fn into_key(self) -> String {
        self.key
    }

    /// Consumes the key-value pair and returns the value.
    #[inline]
    pub fn into_value(self) -> V {
        self.value
    }

    /// Index of the reducer this pair is routed to.
    #[inline]
    pub fn reducer(&self, reducer_count: u32) -> u32 {
        hash::reducer_for(&self.key, reducer_count)
    }
}

impl<V> From<(String, V)> for KeyValue<V> {
    fn from((key, value): (String, V)) -> Self {
        Self { key, value }
    }
}
