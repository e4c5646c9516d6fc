//! Bounded top-K retention for reduce logic.
//!
//! [`BoundedTopK`] keeps the `limit` highest-priority entries it has seen.
//! Two instances with the same limit can be merged into a third, which is
//! how partial results from several reducers (or several passes) combine.
//!
//! Values are never compared. Entries with equal priority are ordered by a
//! tie-break counter that each instance owns; the counter starts from a
//! [`TieBreakSeed`] built from the process id and the host, so entries made
//! by different processes stay distinct after a merge. Tie-breaks are only
//! unique per instance: two instances built in one process from the same
//! seed hand out the same counter values, so merge only instances that came
//! from different processes or different seeds.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::OnceLock;

use itertools::Itertools;

use crate::error::Error;
use crate::hash;

/// Starting point of an instance's tie-break counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TieBreakSeed(u64);

impl TieBreakSeed {
    /// `pid << 48 ^ host << 32`. PIDs are assumed to fit in 16 bits; higher
    /// bits are shifted out.
    pub fn new(pid: u32, host: u32) -> Self {
        Self((u64::from(pid) << 48) ^ (u64::from(host) << 32))
    }

    /// Seed for this process on this host. The host name is looked up
    /// once per process.
    pub fn current() -> Self {
        static CURRENT: OnceLock<TieBreakSeed> = OnceLock::new();
        *CURRENT.get_or_init(|| {
            let host = whoami::fallible::hostname()
                .map(hash::fnv1a_32)
                .unwrap_or_default();
            Self::new(std::process::id(), host)
        })
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

struct Entry<P, V> {
    priority: P,
    tiebreak: u64,
    value: V,
}

// NaN priorities never get in, so `partial_cmp` is total over stored
// entries.
impl<P: PartialOrd, V> Ord for Entry<P, V> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .partial_cmp(&other.priority)
            .unwrap_or(Ordering::Equal)
            .then(self.tiebreak.cmp(&other.tiebreak))
    }
}

impl<P: PartialOrd, V> PartialOrd for Entry<P, V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<P: PartialOrd, V> PartialEq for Entry<P, V> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<P: PartialOrd, V> Eq for Entry<P, V> {}

impl<P: Clone, V: Clone> Clone for Entry<P, V> {
    fn clone(&self) -> Self {
        Self {
            priority: self.priority.clone(),
            tiebreak: self.tiebreak,
            value: self.value.clone(),
        }
    }
}

/// Keeps the `limit` highest-priority `(priority, value)` pairs inserted.
///
/// Iteration order of the accessors is unspecified, not priority order.
pub struct BoundedTopK<P, V> {
    limit: usize,
    // Min-heap: the root is the entry evicted next.
    heap: BinaryHeap<Reverse<Entry<P, V>>>,
    next_tiebreak: u64,
}

impl<P: PartialOrd, V> BoundedTopK<P, V> {
    /// Creates an empty structure seeded for the current process.
    pub fn new(limit: usize) -> Result<Self, Error> {
        Self::with_seed(limit, TieBreakSeed::current())
    }

    /// Creates an empty structure whose tie-break counter starts at `seed`.
    pub fn with_seed(limit: usize, seed: TieBreakSeed) -> Result<Self, Error> {
        if limit == 0 {
            return Err(Error::InvalidLimit(limit));
        }
        Ok(Self {
            limit,
            heap: BinaryHeap::new(),
            next_tiebreak: seed.get(),
        })
    }

    /// Creates a structure with no practical limit.
    pub fn unbounded() -> Self {
        Self {
            limit: usize::MAX,
            heap: BinaryHeap::new(),
            next_tiebreak: TieBreakSeed::current().get(),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Offers `(priority, value)`.
    ///
    /// Unorderable priorities (NaN) are ignored. When full, the entry
    /// replaces the current minimum only if its priority is strictly
    /// greater; otherwise nothing changes.
    pub fn insert(&mut self, priority: P, value: V) {
        debug_assert!(self.heap.len() <= self.limit);
        if priority.partial_cmp(&priority).is_none() {
            return;
        }
        let entry = Entry {
            priority,
            tiebreak: self.next_tiebreak,
            value,
        };
        self.next_tiebreak = self.next_tiebreak.wrapping_add(1);

        if self.heap.len() < self.limit {
            self.heap.push(Reverse(entry));
        } else if let Some(mut min) = self.heap.peek_mut() {
            if entry.priority > min.0.priority {
                // Re-sifted when `min` drops.
                *min = Reverse(entry);
            }
        }
    }

    /// Merges into a new instance holding the `limit` highest entries of
    /// both. Neither input changes.
    pub fn merge(&self, other: &Self) -> Result<Self, Error>
    where
        P: Clone,
        V: Clone,
    {
        self.check_limit(other)?;
        let entries = self
            .heap
            .iter()
            .chain(other.heap.iter())
            .map(|Reverse(e)| e.clone());
        Ok(self.selected(other, entries))
    }

    /// Like [`merge`](Self::merge), but consumes both inputs instead of
    /// cloning their entries.
    pub fn into_merged(self, other: Self) -> Result<Self, Error> {
        self.check_limit(&other)?;
        let next_tiebreak = self.next_tiebreak.max(other.next_tiebreak);
        let entries = self
            .heap
            .into_iter()
            .chain(other.heap)
            .map(|Reverse(e)| e);
        Ok(Self {
            limit: self.limit,
            heap: Self::top(self.limit, entries),
            next_tiebreak,
        })
    }

    /// Current `(priority, value)` pairs.
    pub fn items(&self) -> impl Iterator<Item = (&P, &V)> + '_ {
        self.heap.iter().map(|Reverse(e)| (&e.priority, &e.value))
    }

    pub fn priorities(&self) -> impl Iterator<Item = &P> + '_ {
        self.heap.iter().map(|Reverse(e)| &e.priority)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.heap.iter().map(|Reverse(e)| &e.value)
    }

    /// Consumes the structure and returns its pairs, highest priority first.
    pub fn into_sorted_vec(self) -> Vec<(P, V)> {
        // Ascending `Reverse` order is descending entry order.
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(e)| (e.priority, e.value))
            .collect()
    }

    fn check_limit(&self, other: &Self) -> Result<(), Error> {
        if self.limit != other.limit {
            return Err(Error::LimitMismatch {
                left: self.limit,
                right: other.limit,
            });
        }
        Ok(())
    }

    // Later inserts must tie-break above every entry taken from either side.
    fn selected(&self, other: &Self, entries: impl Iterator<Item = Entry<P, V>>) -> Self {
        Self {
            limit: self.limit,
            heap: Self::top(self.limit, entries),
            next_tiebreak: self.next_tiebreak.max(other.next_tiebreak),
        }
    }

    fn top(
        limit: usize,
        entries: impl Iterator<Item = Entry<P, V>>,
    ) -> BinaryHeap<Reverse<Entry<P, V>>> {
        entries
            .sorted_by(|a, b| b.cmp(a))
            .take(limit)
            .map(Reverse)
            .collect()
    }
}

impl<P: fmt::Debug, V: fmt::Debug> fmt::Debug for BoundedTopK<P, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PQ({}, ", self.limit)?;
        f.debug_list()
            .entries(self.heap.iter().map(|Reverse(e)| (&e.priority, &e.value)))
            .finish()?;
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded<V>(limit: usize, pid: u32) -> BoundedTopK<f64, V> {
        BoundedTopK::with_seed(limit, TieBreakSeed::new(pid, 0xbeef)).unwrap()
    }

    fn sorted_priorities<V>(pq: &BoundedTopK<f64, V>) -> Vec<f64> {
        let mut p: Vec<f64> = pq.priorities().copied().collect();
        p.sort_by(|a, b| a.partial_cmp(b).unwrap());
        p
    }

    #[test]
    fn keeps_highest_and_evicts_minimum() {
        let mut pq = seeded(3, 1);
        assert!(pq.is_empty());
        pq.insert(1.0, 'a');
        pq.insert(3.0, 'b');
        pq.insert(2.0, 'c');
        assert_eq!(pq.len(), 3);

        pq.insert(4.0, 'd');
        assert_eq!(sorted_priorities(&pq), vec![2.0, 3.0, 4.0]);

        pq.insert(1.0, 'e');
        assert_eq!(sorted_priorities(&pq), vec![2.0, 3.0, 4.0]);
        let mut values: Vec<char> = pq.values().copied().collect();
        values.sort();
        assert_eq!(values, vec!['b', 'c', 'd']);
    }

    #[test]
    fn equal_priority_does_not_evict() {
        let mut pq = seeded(2, 1);
        pq.insert(5.0, "first");
        pq.insert(5.0, "second");
        pq.insert(5.0, "third");
        let mut values: Vec<&str> = pq.values().copied().collect();
        values.sort();
        assert_eq!(values, vec!["first", "second"]);
    }

    #[test]
    fn nan_priority_is_ignored() {
        let mut pq = seeded(2, 1);
        pq.insert(f64::NAN, "nan");
        assert!(pq.is_empty());
        pq.insert(1.0, "one");
        pq.insert(f64::NAN, "nan");
        assert_eq!(pq.len(), 1);
    }

    #[test]
    fn values_need_no_ordering() {
        struct Opaque;
        let mut pq = seeded(2, 1);
        pq.insert(1.0, Opaque);
        pq.insert(1.0, Opaque);
        pq.insert(2.0, Opaque);
        assert_eq!(sorted_priorities(&pq), vec![1.0, 2.0]);
    }

    #[test]
    fn zero_limit_is_rejected() {
        let err = BoundedTopK::<f64, ()>::new(0).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "limit 0 is not greater than zero");
    }

    #[test]
    fn merge_requires_equal_limits() {
        let a = seeded::<()>(3, 1);
        let b = seeded::<()>(2, 2);
        let err = a.merge(&b).unwrap_err();
        assert!(matches!(err, Error::LimitMismatch { left: 3, right: 2 }));
        assert!(err.is_configuration());
    }

    #[test]
    fn merge_keeps_global_maximum() {
        let mut a = seeded(3, 1);
        for (p, v) in [(1.0, 'a'), (3.0, 'b'), (2.0, 'c'), (4.0, 'd')] {
            a.insert(p, v);
        }
        let mut b = seeded(3, 2);
        b.insert(3.0, 'e');
        b.insert(5.0, 'f');

        let merged = a.merge(&b).unwrap();
        assert_eq!(merged.limit(), 3);
        assert_eq!(merged.len(), 3);
        assert_eq!(sorted_priorities(&merged), vec![3.0, 4.0, 5.0]);

        // inputs untouched
        assert_eq!(sorted_priorities(&a), vec![2.0, 3.0, 4.0]);
        assert_eq!(sorted_priorities(&b), vec![3.0, 5.0]);

        // the result keeps working
        let mut merged = merged;
        merged.insert(6.0, 'g');
        assert_eq!(sorted_priorities(&merged), vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn merge_breaks_ties_by_counter() {
        let mut a = seeded(2, 1);
        a.insert(1.0, "a-low");
        let mut b = seeded(2, 2);
        b.insert(1.0, "b-high");
        b.insert(1.0, "b-higher");

        // pid 2 seeds above pid 1, so b's entries win the tie
        let merged = a.into_merged(b).unwrap();
        let mut values: Vec<&str> = merged.values().copied().collect();
        values.sort();
        assert_eq!(values, vec!["b-high", "b-higher"]);
    }

    #[test]
    fn merged_counter_continues_above_both_inputs() {
        let a = seeded::<&str>(2, 1);
        let mut b = seeded(2, 2);
        b.insert(1.0, "from-b");

        let mut merged = a.merge(&b).unwrap();
        merged.insert(1.0, "later");
        let order: Vec<&str> = merged.into_sorted_vec().into_iter().map(|(_, v)| v).collect();
        assert_eq!(order, vec!["later", "from-b"]);

        let mut consumed = seeded::<&str>(2, 1).into_merged(b).unwrap();
        consumed.insert(1.0, "later");
        let order: Vec<&str> = consumed.into_sorted_vec().into_iter().map(|(_, v)| v).collect();
        assert_eq!(order, vec!["later", "from-b"]);
    }

    #[test]
    fn sorted_output_and_debug() {
        let mut pq = seeded(3, 1);
        pq.insert(2.0, 'x');
        pq.insert(9.0, 'y');
        assert_eq!(format!("{:?}", seeded::<char>(3, 1)), "PQ(3, [])");
        assert_eq!(pq.into_sorted_vec(), vec![(9.0, 'y'), (2.0, 'x')]);
    }

    #[test]
    fn seeds_separate_processes() {
        let a = TieBreakSeed::new(1, 7);
        let b = TieBreakSeed::new(2, 7);
        assert_ne!(a, b);
        assert_eq!(a.get(), (1u64 << 48) ^ (7u64 << 32));
        assert_eq!(TieBreakSeed::current(), TieBreakSeed::current());
        assert_eq!(BoundedTopK::<i32, ()>::unbounded().limit(), usize::MAX);
    }
}
