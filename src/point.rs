// Copyright (c) 2017-2021 Fabian Schuiki

//! Observation points.
//!
//! Points are the observations of a trajectory after ids have been stamped
//! in scan order. Each point carries its neighbor set, the regions in which
//! it serves as a core point keyed by the time frame that birthed them, and
//! the labelling slots filled by the post-analysis.

use crate::{
    geom::Coord,
    impl_table_key, impl_table_indexing,
    region::{Forest, PhaseState, Reg},
    table::PrimaryTable,
};
use std::collections::BTreeSet;

impl_table_key! {
    /// An observation of the trajectory, stamped in scan order.
    struct Obs(u32) as "p";
}

/// Internal storage for a point.
#[derive(Debug, Clone)]
pub struct PointData {
    /// The observed coordinate.
    pub geom: Coord,
    /// The observation timestamp, in seconds.
    pub time: f64,
    /// Neighbor set; symmetric and reflexive.
    pub neighbors: BTreeSet<Obs>,
    /// Regions in which this point is core, keyed by the frame start of the
    /// phase that created them. Within one frame a point is core in at most
    /// one region, so this is a flat list with at most a few entries.
    regions: Vec<(f64, Reg)>,
    /// Latched when the point first proves dense.
    pub core: bool,
    /// The final cluster of this point, if any.
    pub cluster: Option<Reg>,
    /// The cluster preceding a non-clustered point.
    pub prev: Option<Reg>,
    /// The cluster following a non-clustered point.
    pub next: Option<Reg>,
    /// The first region that absorbed this point.
    pub first: Option<Reg>,
    /// Rank of this point's neighborhood size within its cluster.
    pub density_rank: usize,
}

/// The points of one trajectory scan.
pub struct Points {
    table: PrimaryTable<Obs, PointData>,
}

impl_table_indexing!(Points, table, Obs, PointData);

impl Points {
    /// Create an empty point store.
    pub fn new() -> Self {
        Points {
            table: PrimaryTable::new(),
        }
    }

    /// Add an observation. Ids are assigned in call order, so the caller
    /// must feed observations sorted by timestamp.
    pub fn add(&mut self, geom: Coord, time: f64) -> Obs {
        let id = self.table.add(PointData {
            geom,
            time,
            neighbors: BTreeSet::new(),
            regions: Vec::new(),
            core: false,
            cluster: None,
            prev: None,
            next: None,
            first: None,
            density_rank: 0,
        });
        self.table[id].neighbors.insert(id);
        id
    }

    /// Return the number of points.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Check whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Return the point ids in scan order.
    pub fn keys(&self) -> impl Iterator<Item = Obs> {
        self.table.keys()
    }

    /// Check whether a point is dense in the frame starting at `start`.
    ///
    /// A point is dense if at least `threshold` of its neighbors were
    /// observed after the frame start. Latches the core flag when true.
    pub fn is_dense(&mut self, p: Obs, threshold: usize, start: f64) -> bool {
        let dense = self.table[p]
            .neighbors
            .iter()
            .filter(|&&q| self.table[q].time > start)
            .count()
            >= threshold;
        if dense {
            self.table[p].core = true;
        }
        dense
    }

    /// Check whether a point is a core point in the frame starting at
    /// `start`, i.e. owns a region created under that frame.
    pub fn is_core(&self, p: Obs, start: f64) -> bool {
        self.table[p].regions.iter().any(|&(s, _)| s == start)
    }

    /// Check whether a point is a border point in the frame starting at
    /// `start`, i.e. has a neighbor that is core there.
    pub fn is_border(&self, p: Obs, start: f64) -> bool {
        self.table[p].neighbors.iter().any(|&q| self.is_core(q, start))
    }

    /// Return the representative of the region in which `p` is core.
    ///
    /// Panics if `p` is not core in the frame.
    pub fn core_region(&self, p: Obs, start: f64, forest: &Forest) -> Reg {
        let region = self.table[p]
            .regions
            .iter()
            .find(|&&(s, _)| s == start)
            .map(|&(_, r)| r)
            .unwrap_or_else(|| panic!("{} is not core in the frame starting at {}", p, start));
        forest.walk(region)
    }

    /// Register the region in which `p` is core for the frame starting at
    /// `start`. Panics if `p` already owns a region under that frame.
    fn add_core_region(&mut self, p: Obs, start: f64, region: Reg) {
        if self.is_core(p, start) {
            panic!("{} is already core in two regions with frame start {}", p, start);
        }
        self.table[p].regions.push((start, region));
    }

    /// Return the representatives of the core regions among `p`'s neighbors.
    pub fn neighboring_regions(&self, p: Obs, start: f64, forest: &Forest) -> BTreeSet<Reg> {
        let mut result = BTreeSet::new();
        for &q in &self.table[p].neighbors {
            if self.is_core(q, start) {
                result.insert(self.core_region(q, start, forest));
            }
        }
        result
    }

    /// Return the regions this point belongs to in the frame starting at
    /// `start`: its own region if core, the neighboring core regions if
    /// border, nothing otherwise. Iteration is in region id order.
    pub fn get_regions(&self, p: Obs, start: f64, forest: &Forest) -> BTreeSet<Reg> {
        if self.is_core(p, start) {
            let mut result = BTreeSet::new();
            result.insert(self.core_region(p, start, forest));
            result
        } else if self.is_border(p, start) {
            self.neighboring_regions(p, start, forest)
        } else {
            BTreeSet::new()
        }
    }

    /// Update the neighborhood of `p` with the given new neighbors.
    ///
    /// For every neighbor `q` (the list ends with `p` itself):
    ///
    /// 1. the relation is made symmetric;
    /// 2. if `q` is already core, `p` joins `q`'s region as a border point;
    /// 3. if `q` just became dense: either all the regions around `q` are
    ///    merged into one (border case) or a fresh leaf region is grown
    ///    around `q`, and `q`'s neighbors within the frame are absorbed.
    pub fn update_neighbors(
        &mut self,
        p: Obs,
        neighbors: &[Obs],
        threshold: usize,
        start: f64,
        forest: &mut Forest,
        state: &mut PhaseState,
    ) {
        self.table[p].neighbors.extend(neighbors.iter().copied());

        for &q in neighbors {
            self.table[q].neighbors.insert(p);

            if self.is_core(q, start) {
                let region = self.core_region(q, start, forest);
                if !forest.contains(region, p) {
                    let (time, geom) = (self.table[p].time, self.table[p].geom);
                    forest.expand(region, p, time, geom, state);
                    if self.table[p].first.is_none() {
                        self.table[p].first = Some(region);
                    }
                }
            } else if self.is_dense(q, threshold, start) {
                let (q_time, q_geom) = (self.table[q].time, self.table[q].geom);
                if self.is_border(q, start) {
                    // Join all the regions around q and absorb its frame
                    // neighbors into the result.
                    let operands = self.neighboring_regions(q, start, forest);
                    let big = forest.merge(&operands, q, q_geom, state);
                    let context = forest[big].start_context;
                    let around: Vec<Obs> = self.table[q].neighbors.iter().copied().collect();
                    for n in around {
                        if self.table[n].time > context && !forest.contains(big, n) {
                            let (time, geom) = (self.table[n].time, self.table[n].geom);
                            forest.expand(big, n, time, geom, state);
                            if self.table[n].first.is_none() {
                                self.table[n].first = Some(big);
                            }
                        }
                    }
                    self.add_core_region(q, start, big);
                } else {
                    // Grow a fresh leaf around q.
                    let region = forest.create_leaf(q, q_geom, start, state);
                    let around: Vec<Obs> = self.table[q].neighbors.iter().copied().collect();
                    for n in around {
                        if self.table[n].time > start {
                            let (time, geom) = (self.table[n].time, self.table[n].geom);
                            forest.expand(region, n, time, geom, state);
                            if self.table[n].first.is_none() {
                                self.table[n].first = Some(region);
                            }
                        }
                    }
                    forest.seal_creation(region, q_time);
                    self.add_core_region(q, start, region);
                    self.table[q].first = Some(region);
                }
            }
        }
    }
}

impl Default for Points {
    fn default() -> Self {
        Points::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Forest;

    const START: f64 = f64::NEG_INFINITY;

    fn setup() -> (Points, Forest, PhaseState) {
        (Points::new(), Forest::new(15.0), PhaseState::new())
    }

    #[test]
    fn points_are_their_own_neighbors() {
        let (mut points, ..) = setup();
        let p = points.add(Coord::new(0.0, 0.0), 0.0);
        assert!(points[p].neighbors.contains(&p));
    }

    #[test]
    fn neighbor_updates_are_symmetric() {
        let (mut points, mut forest, mut state) = setup();
        let a = points.add(Coord::new(0.0, 0.0), 0.0);
        let b = points.add(Coord::new(0.5, 0.0), 10.0);
        let c = points.add(Coord::new(0.0, 0.5), 20.0);
        // Threshold high enough that nobody becomes dense.
        points.update_neighbors(c, &[a, b, c], 10, START, &mut forest, &mut state);
        for &q in &[a, b] {
            assert!(points[q].neighbors.contains(&c));
            assert!(points[c].neighbors.contains(&q));
        }
        assert_eq!(forest.num_regions(), 0);
    }

    #[test]
    fn a_dense_point_grows_a_leaf_region() {
        let (mut points, mut forest, mut state) = setup();
        let a = points.add(Coord::new(0.0, 0.0), 0.0);
        let b = points.add(Coord::new(0.5, 0.0), 10.0);
        points.update_neighbors(b, &[a, b], 2, START, &mut forest, &mut state);
        assert!(points.is_core(a, START));
        assert!(points.is_core(b, START));
        assert!(points[a].core);
        let region = points.core_region(a, START, &forest);
        assert!(forest.contains(region, a));
        assert!(forest.contains(region, b));
        assert_eq!(points[a].first, Some(region));
        assert_eq!(points[b].first, Some(region));
        assert_eq!(forest[region].c_time, Some(0.0));
    }

    #[test]
    fn a_border_point_joins_the_existing_region() {
        let (mut points, mut forest, mut state) = setup();
        let a = points.add(Coord::new(0.0, 0.0), 0.0);
        let b = points.add(Coord::new(0.5, 0.0), 10.0);
        let c = points.add(Coord::new(0.0, 0.5), 20.0);
        points.update_neighbors(b, &[a, b], 2, START, &mut forest, &mut state);
        points.update_neighbors(c, &[a, c], 2, START, &mut forest, &mut state);
        let region = points.core_region(a, START, &forest);
        assert!(forest.contains(region, c));
        assert!(points.is_border(c, START));
        let regions = points.get_regions(c, START, &forest);
        assert_eq!(regions.len(), 1);
        assert!(regions.contains(&region));
    }

    #[test]
    fn a_bridging_point_merges_its_regions() {
        let (mut points, mut forest, mut state) = setup();
        let a = points.add(Coord::new(0.0, 0.0), 0.0);
        let b = points.add(Coord::new(0.5, 0.0), 10.0);
        let d = points.add(Coord::new(10.0, 0.0), 20.0);
        let e = points.add(Coord::new(10.5, 0.0), 30.0);
        let f = points.add(Coord::new(5.0, 0.0), 40.0);
        points.update_neighbors(b, &[a, b], 2, START, &mut forest, &mut state);
        points.update_neighbors(e, &[d, e], 2, START, &mut forest, &mut state);
        let r1 = points.core_region(a, START, &forest);
        let r2 = points.core_region(d, START, &forest);
        assert_ne!(r1, r2);

        points.update_neighbors(f, &[a, d, f], 2, START, &mut forest, &mut state);
        assert!(points.is_core(f, START));
        let node = points.core_region(f, START, &forest);
        assert_ne!(node, r1);
        assert_ne!(node, r2);
        assert_eq!(forest.walk(r1), node);
        assert_eq!(forest.walk(r2), node);
        for &p in &[a, b, d, e, f] {
            assert!(forest.contains(node, p));
        }
        // The operands left the log; the node took their place.
        assert!(!state.expansion_log.contains(&r1));
        assert!(!state.expansion_log.contains(&r2));
        assert!(state.expansion_log.contains(&node));
    }

    #[test]
    fn frame_starts_scope_the_core_registrations() {
        let (mut points, mut forest, mut state) = setup();
        let a = points.add(Coord::new(0.0, 0.0), 0.0);
        let b = points.add(Coord::new(0.5, 0.0), 10.0);
        points.update_neighbors(b, &[a, b], 2, START, &mut forest, &mut state);
        assert!(points.is_core(a, START));
        assert!(!points.is_core(a, 5.0));
        assert!(!points.is_border(b, 5.0));
        assert!(points.get_regions(b, 5.0, &forest).is_empty());
    }

    #[test]
    fn density_counts_only_the_frame_neighbors() {
        let (mut points, mut forest, mut state) = setup();
        let a = points.add(Coord::new(0.0, 0.0), 0.0);
        let b = points.add(Coord::new(0.5, 0.0), 10.0);
        let c = points.add(Coord::new(0.0, 0.5), 20.0);
        points.update_neighbors(c, &[a, b, c], 10, START, &mut forest, &mut state);
        assert!(points.is_dense(c, 3, START));
        assert!(points.is_dense(c, 2, 5.0));
        assert!(!points.is_dense(c, 3, 5.0));
        assert!(!points.is_dense(c, 2, 15.0));
    }
}
