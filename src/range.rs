// Copyright (c) 2017-2021 Fabian Schuiki

//! Event ranges.
//!
//! A `SimpleRange` is the interval between two events of a trajectory, e.g.
//! two consecutive positions of an animal. Each event is denoted by its
//! scan-order id and its timestamp: ids decide whether two ranges can merge,
//! timestamps measure their length.

/// An interval between two events of a trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpleRange {
    /// Id of the first event.
    pub start: usize,
    /// Timestamp of the first event, in seconds.
    pub t_start: f64,
    /// Id of the last event.
    pub stop: usize,
    /// Timestamp of the last event, in seconds.
    pub t_stop: f64,
    duration: f64,
}

impl SimpleRange {
    /// Create a range spanning two events.
    ///
    /// Panics if the ids or the timestamps are inverted.
    pub fn new(start: usize, t_start: f64, stop: usize, t_stop: f64) -> Self {
        if start > stop {
            panic!("start id {} follows stop id {}", start, stop);
        }
        if t_start > t_stop {
            panic!("start timestamp {} follows stop timestamp {}", t_start, t_stop);
        }
        SimpleRange {
            start,
            t_start,
            stop,
            t_stop,
            duration: t_stop - t_start,
        }
    }

    /// Create a range covering a single event.
    pub fn at(id: usize, t: f64) -> Self {
        SimpleRange::new(id, t, id, t)
    }

    /// Return the cached timestamp span of the range, in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Check whether this range strictly precedes or follows another.
    ///
    /// Ids are integers, so `[a, i]` meets `[i+1, b]`: only a gap of two or
    /// more ids separates two ranges.
    pub fn disjoint(&self, other: &SimpleRange) -> bool {
        self.stop + 1 < other.start || other.stop + 1 < self.start
    }

    /// Merge two non-disjoint ranges into their component-wise hull.
    ///
    /// Panics if the ranges are disjoint.
    pub fn union(&self, other: &SimpleRange) -> SimpleRange {
        if self.disjoint(other) {
            panic!("{:?} and {:?} are disjoint", self, other);
        }
        SimpleRange::new(
            self.start.min(other.start),
            self.t_start.min(other.t_start),
            self.stop.max(other.stop),
            self.t_stop.max(other.t_stop),
        )
    }

    /// Check whether an event id falls inside the range.
    pub fn contains_id(&self, id: usize) -> bool {
        self.start <= id && id <= self.stop
    }
}
