// Copyright (c) 2017-2021 Fabian Schuiki

//! The region forest.
//!
//! Regions are the spatial residences discovered by the scan. Leaves are
//! created when a point first becomes dense; nodes are created when a newly
//! dense point joins several live regions. Regions never shrink: a merge
//! redirects the `hook` and `next` pointers of its operands at the new node,
//! which from then on is the single canonical instance of the cluster. The
//! forest is an arena, so the parent/child back-references are plain keys
//! and the whole structure drops at trajectory end.

use crate::{
    descriptor::TimeDescriptor,
    geom::{Coord, Rect},
    impl_table_key, impl_table_indexing,
    point::{Obs, Points},
    range::SimpleRange,
    table::{PrimaryTable, TableKey},
};
use std::collections::BTreeSet;

impl_table_key! {
    /// A region of the forest.
    struct Reg(u32) as "r";
}

/// Discriminates freshly grown regions from merge results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Leaf,
    Node,
}

/// Internal storage for a region.
#[derive(Debug, Clone)]
pub struct RegionData {
    pub kind: RegionKind,
    /// Leaves sit at level 0; a merge result is one above its children.
    pub level: u32,
    /// The instants at which the region was visited.
    pub time: TimeDescriptor,
    /// All member points, including those of merged children.
    pub points: BTreeSet<Obs>,
    /// Points added after this region became a merge result (nodes only).
    pub more_points: BTreeSet<Obs>,
    /// Immediate children of a merge result.
    pub children: Vec<Reg>,
    /// Bounding box over the member points.
    pub bbox: Rect,
    /// Excursion points charged against this region.
    pub noise: u32,
    /// Latched once presence reaches the threshold; never reset.
    pub persistent: bool,
    /// Timestamp of the owning point at creation.
    pub c_time: Option<f64>,
    /// Presence at creation.
    pub c_pres: Option<f64>,
    /// Start of the time frame of the phase that birthed this region.
    pub start_context: f64,
    hook: Reg,
    next: Reg,
}

/// The phase of the driver state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// An active cluster exists and the scan tries to grow it.
    Expansion,
    /// No active cluster; the scan probes for a new one.
    LookUp,
}

/// Per-trajectory scratch state segregated by phase.
///
/// Regions and candidate noise points are logged under the phase that
/// produced them, so that a failed look-up can be discarded wholesale while
/// the expansion context survives, and promoted on a cluster transition.
#[derive(Debug, Clone)]
pub struct PhaseState {
    pub phase: Phase,
    pub expansion_log: BTreeSet<Reg>,
    pub look_up_log: BTreeSet<Reg>,
    pub expansion_noise: BTreeSet<Obs>,
    pub look_up_noise: BTreeSet<Obs>,
}

impl PhaseState {
    /// Create the initial state of a trajectory scan.
    pub fn new() -> Self {
        PhaseState {
            phase: Phase::Expansion,
            expansion_log: BTreeSet::new(),
            look_up_log: BTreeSet::new(),
            expansion_noise: BTreeSet::new(),
            look_up_noise: BTreeSet::new(),
        }
    }

    /// The region log of the current phase.
    pub fn log_mut(&mut self) -> &mut BTreeSet<Reg> {
        match self.phase {
            Phase::Expansion => &mut self.expansion_log,
            Phase::LookUp => &mut self.look_up_log,
        }
    }

    /// The noise set of the current phase.
    pub fn noise_mut(&mut self) -> &mut BTreeSet<Obs> {
        match self.phase {
            Phase::Expansion => &mut self.expansion_noise,
            Phase::LookUp => &mut self.look_up_noise,
        }
    }

    /// Drop the look-up context after a successful expansion.
    pub fn clear_look_up(&mut self) {
        self.look_up_log.clear();
        self.look_up_noise.clear();
    }

    /// Promote the look-up context to the expansion role on a transition.
    pub fn promote(&mut self) {
        self.expansion_log = std::mem::take(&mut self.look_up_log);
        self.expansion_noise = std::mem::take(&mut self.look_up_noise);
    }
}

impl Default for PhaseState {
    fn default() -> Self {
        PhaseState::new()
    }
}

/// The forest of regions of one trajectory scan.
pub struct Forest {
    regions: PrimaryTable<Reg, RegionData>,
    /// Presence threshold for persistence, in seconds.
    threshold: f64,
}

impl_table_indexing!(Forest, regions, Reg, RegionData);

impl Forest {
    /// Create an empty forest with the given persistence threshold.
    pub fn new(threshold: f64) -> Self {
        Forest {
            regions: PrimaryTable::new(),
            threshold,
        }
    }

    /// Return the number of regions ever created.
    pub fn num_regions(&self) -> usize {
        self.regions.len()
    }

    /// Allocate an empty region owned by `owner`.
    ///
    /// The new region joins the current phase's log and clears the owner
    /// from the phase's noise set.
    fn alloc(&mut self, kind: RegionKind, owner: Obs, geom: Coord, state: &mut PhaseState) -> Reg {
        let id = self.regions.next_key();
        let mut points = BTreeSet::new();
        points.insert(owner);
        let more_points = match kind {
            RegionKind::Leaf => BTreeSet::new(),
            RegionKind::Node => points.clone(),
        };
        self.regions.add(RegionData {
            kind,
            level: 0,
            time: TimeDescriptor::new(),
            points,
            more_points,
            children: Vec::new(),
            bbox: Rect::around(geom),
            noise: 0,
            persistent: false,
            c_time: None,
            c_pres: None,
            start_context: f64::INFINITY,
            hook: id,
            next: id,
        });
        state.log_mut().insert(id);
        state.noise_mut().remove(&owner);
        id
    }

    /// Create a leaf region for a point that became dense with no prior
    /// overlapping region.
    pub fn create_leaf(&mut self, owner: Obs, geom: Coord, start: f64, state: &mut PhaseState) -> Reg {
        let id = self.alloc(RegionKind::Leaf, owner, geom, state);
        self.regions[id].start_context = start;
        id
    }

    /// Record the creation timestamp and presence of a fresh leaf.
    pub fn seal_creation(&mut self, region: Reg, time: f64) {
        let presence = self.regions[region].time.presence();
        let data = &mut self.regions[region];
        data.c_time = Some(time);
        data.c_pres = Some(presence);
    }

    /// Return the representative of a region.
    ///
    /// Follows the `hook` pointers to their fixed point. Panics if the
    /// representative disagrees with its own `next` pointer, which means
    /// the forest is corrupt.
    pub fn walk(&self, region: Reg) -> Reg {
        let mut cur = region;
        while self.regions[cur].hook != cur {
            cur = self.regions[cur].hook;
        }
        if self.regions[cur].next != cur {
            panic!("walk({}) ended at {} whose next pointer disagrees", region, cur);
        }
        cur
    }

    /// Check whether a point is a member of a region.
    pub fn contains(&self, region: Reg, point: Obs) -> bool {
        self.regions[region].points.contains(&point)
    }

    /// Add a point to a region.
    ///
    /// Extends the time descriptor with the point's range, latches the
    /// persistence flag, removes the point from the current phase's noise
    /// set, and grows the bounding box.
    pub fn expand(&mut self, region: Reg, point: Obs, time: f64, geom: Coord, state: &mut PhaseState) {
        let threshold = self.threshold;
        let data = &mut self.regions[region];
        data.time.add(SimpleRange::at(point.index(), time));
        data.persistent |= data.time.presence() >= threshold;
        data.points.insert(point);
        if data.kind == RegionKind::Node {
            data.more_points.insert(point);
        }
        data.bbox.combine_extent_with(geom.x, geom.y);
        state.noise_mut().remove(&point);
    }

    /// Join a set of regions around a common point.
    ///
    /// Operands are first replaced by their representatives. A single
    /// representative is returned as is; otherwise a new node region owned
    /// by `point` takes over the operands' time, membership, box and log
    /// slots, and becomes their representative.
    pub fn merge(
        &mut self,
        operands: &BTreeSet<Reg>,
        point: Obs,
        geom: Coord,
        state: &mut PhaseState,
    ) -> Reg {
        if operands.is_empty() {
            panic!("merging an empty set of regions");
        }
        let finals: BTreeSet<Reg> = operands.iter().map(|&r| self.walk(r)).collect();
        if finals.len() == 1 {
            return *finals.iter().next().unwrap();
        }

        let result = self.alloc(RegionKind::Node, point, geom, state);
        let mut time = std::mem::take(&mut self.regions[result].time);
        let mut points = std::mem::take(&mut self.regions[result].points);
        let mut bbox = self.regions[result].bbox;
        let mut level = 0;
        let mut persistent = false;
        for &r in &finals {
            let child = &self.regions[r];
            time = TimeDescriptor::union(&time, &child.time);
            points.extend(child.points.iter().copied());
            bbox.combine_extent_with_rect(&child.bbox);
            level = level.max(child.level);
            persistent |= child.persistent;
        }
        for &r in &finals {
            self.regions[r].next = result;
            state.log_mut().remove(&r);
        }
        for &r in finals.iter().chain(operands.iter()) {
            self.regions[r].hook = result;
        }
        // All merged regions share the active time frame; adopt the context
        // of the smallest representative.
        let start_context = self.regions[*finals.iter().next().unwrap()].start_context;
        let presence = time.presence();
        let threshold = self.threshold;
        let data = &mut self.regions[result];
        data.time = time;
        data.points = points;
        data.bbox = bbox;
        data.children = finals.iter().copied().collect();
        data.level = 1 + level;
        data.persistent = persistent || presence >= threshold;
        data.start_context = start_context;
        result
    }

    /// Collect into `result` every member point lying inside `square`.
    ///
    /// Explores the forest with an explicit stack. Leaves scan their member
    /// set; nodes scan the points added after the merge and descend into
    /// children whose boxes intersect the square.
    pub fn query(&self, region: Reg, square: &Rect, points: &Points, result: &mut BTreeSet<Obs>) {
        if !self.regions[region].bbox.intersects(square) {
            return;
        }
        let mut stack = vec![region];
        while let Some(cur) = stack.pop() {
            let data = &self.regions[cur];
            let scan = match data.kind {
                RegionKind::Leaf => &data.points,
                RegionKind::Node => &data.more_points,
            };
            for &q in scan {
                if square.contains_point(points[q].geom) {
                    result.insert(q);
                }
            }
            for &child in &data.children {
                if self.regions[child].bbox.intersects(square) {
                    stack.push(child);
                }
            }
        }
    }

    /// Return the presence of a region, in seconds.
    pub fn presence(&self, region: Reg) -> f64 {
        self.regions[region].time.presence()
    }

    /// Return the duration of a region, in seconds.
    pub fn duration(&self, region: Reg) -> f64 {
        self.regions[region].time.duration()
    }

    /// Return the first timestamp of a region.
    pub fn first_timestamp(&self, region: Reg) -> Option<f64> {
        self.regions[region].time.first()
    }

    /// Return the last timestamp of a region.
    pub fn last_timestamp(&self, region: Reg) -> Option<f64> {
        self.regions[region].time.last()
    }

    /// Check whether a region was first visited after the frame start.
    pub fn in_time_frame(&self, region: Reg, start: f64) -> bool {
        self.regions[region].time.first().map_or(false, |t| start < t)
    }

    /// Return the arithmetic mean of the member coordinates.
    pub fn centroid(&self, region: Reg, points: &Points) -> Coord {
        let members = &self.regions[region].points;
        let n = members.len().max(1) as f64;
        let (mut x, mut y) = (0.0, 0.0);
        for &p in members {
            x += points[p].geom.x;
            y += points[p].geom.y;
        }
        Coord::new(x / n, y / n)
    }
}
