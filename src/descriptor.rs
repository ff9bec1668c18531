// Copyright (c) 2017-2021 Fabian Schuiki

//! Time descriptors.
//!
//! A `TimeDescriptor` tracks the instants at which a region was visited, as
//! an ordered list of pairwise id-disjoint `SimpleRange`s. The descriptor
//! distinguishes *presence*, the summed length of its ranges, from
//! *duration*, the span between its first and last timestamp. A region is
//! persistent when its presence reaches the threshold, no matter how long
//! the object kept coming back.

use crate::range::SimpleRange;
use itertools::Itertools;

/// An ordered list of id-disjoint event ranges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeDescriptor {
    segment: Vec<SimpleRange>,
}

impl TimeDescriptor {
    /// Create an empty descriptor.
    pub fn new() -> Self {
        Default::default()
    }

    /// Create a descriptor holding a single range.
    pub fn from_range(sr: SimpleRange) -> Self {
        TimeDescriptor { segment: vec![sr] }
    }

    /// Merge two descriptors.
    ///
    /// The result is ordered by start id and coalesces ranges that overlap
    /// or are id-adjacent, preserving the pairwise disjointness invariant.
    pub fn union(r1: &TimeDescriptor, r2: &TimeDescriptor) -> TimeDescriptor {
        let merged = r1
            .segment
            .iter()
            .merge_by(r2.segment.iter(), |a, b| a.start <= b.start);
        let mut segment: Vec<SimpleRange> = Vec::with_capacity(r1.len() + r2.len());
        for &sr in merged {
            match segment.last_mut() {
                Some(last) if !last.disjoint(&sr) => *last = last.union(&sr),
                _ => segment.push(sr),
            }
        }
        TimeDescriptor { segment }
    }

    /// Add a single range to this descriptor.
    pub fn add(&mut self, sr: SimpleRange) {
        let single = TimeDescriptor::from_range(sr);
        *self = TimeDescriptor::union(self, &single);
    }

    /// Return the summed length of all ranges, in seconds.
    pub fn presence(&self) -> f64 {
        self.segment.iter().map(|sr| sr.duration()).sum()
    }

    /// Return the span between the first and the last timestamp, in seconds.
    pub fn duration(&self) -> f64 {
        match (self.segment.first(), self.segment.last()) {
            (Some(first), Some(last)) => last.t_stop - first.t_start,
            _ => 0.0,
        }
    }

    /// Return the first timestamp covered by this descriptor.
    pub fn first(&self) -> Option<f64> {
        self.segment.first().map(|sr| sr.t_start)
    }

    /// Return the last timestamp covered by this descriptor.
    pub fn last(&self) -> Option<f64> {
        self.segment.last().map(|sr| sr.t_stop)
    }

    /// Return the number of disjoint ranges.
    pub fn len(&self) -> usize {
        self.segment.len()
    }

    /// Check whether the descriptor covers no event at all.
    pub fn is_empty(&self) -> bool {
        self.segment.is_empty()
    }

    /// Return the ranges in id order.
    pub fn ranges(&self) -> &[SimpleRange] {
        &self.segment
    }
}
