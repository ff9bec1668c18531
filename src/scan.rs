// Copyright (c) 2017-2021 Fabian Schuiki

//! The scan driver.
//!
//! This module implements the streaming scan over a single trajectory. The
//! driver admits observations one at a time in timestamp order and runs a
//! two-phase state machine: while an active cluster exists the scan tries
//! to *expand* it, absorbing returning points; otherwise it *looks up* a new
//! persistent region among the recent observations. On a transition the
//! look-up context is promoted to the expansion role and the closed cluster
//! joins the final set. After the scan a labelling pass classifies the
//! non-clustered stretches as excursions, transitions, or plain noise.

use crate::{
    geom::{Coord, Distance, Envelope},
    output::{self, ClassRow, StopRow},
    point::{Obs, Points},
    region::{Forest, Phase, PhaseState, Reg},
    traj::Trajectory,
};
use std::collections::BTreeSet;

/// The clustering parameters of a scan.
#[derive(Debug, Clone, Copy)]
pub struct Params {
    /// Neighborhood radius, in the units of the trajectory's coordinates
    /// (meters for geographic trajectories).
    pub eps: f64,
    /// Minimum neighborhood size of a dense point.
    pub n: usize,
    /// Presence threshold for persistence, in seconds.
    pub delta: f64,
}

/// The result of a single-trajectory scan.
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// One classification row per observation, in time order.
    pub classification: Vec<ClassRow>,
    /// One row per discovered stop, in chronological order.
    pub stops: Vec<StopRow>,
}

impl ScanResult {
    /// Return the number of discovered stops.
    pub fn num_stops(&self) -> usize {
        self.stops.len()
    }
}

/// A configured scan over one trajectory.
pub struct SeqScan<'a> {
    trajectory: &'a Trajectory,
    params: Params,
}

impl<'a> SeqScan<'a> {
    /// Create a scan over a trajectory.
    pub fn new(trajectory: &'a Trajectory, params: Params) -> Self {
        SeqScan { trajectory, params }
    }

    /// Execute the scan and produce the two output streams.
    pub fn run(&self) -> ScanResult {
        let distance = Distance::for_cartesian(self.trajectory.cartesian);
        let mut scanner = Scanner::new(self.trajectory, self.params, distance);
        scanner.scan();
        scanner.analyze();
        info!(
            "scanned {} observations into {} stops ({} regions)",
            scanner.points.len(),
            scanner.clusters.len(),
            scanner.forest.num_regions(),
        );
        ScanResult {
            classification: output::classification_rows(
                &scanner.points,
                self.trajectory.tag_id.as_deref(),
            ),
            stops: output::stop_rows(
                &scanner.points,
                &scanner.forest,
                &scanner.clusters,
                self.trajectory.tag_id.as_deref(),
            ),
        }
    }
}

/// The mutable state of a running scan.
struct Scanner {
    points: Points,
    forest: Forest,
    state: PhaseState,
    /// Final clusters in discovery order.
    clusters: Vec<Reg>,
    /// Start of the active time frame.
    time_start: f64,
    /// Last instant confirmed inside the active cluster.
    time_end: f64,
    active: Option<Reg>,
    params: Params,
    distance: Distance,
}

impl Scanner {
    fn new(trajectory: &Trajectory, params: Params, distance: Distance) -> Self {
        let mut points = Points::new();
        for obs in trajectory.iter() {
            points.add(Coord::new(obs.x, obs.y), obs.time);
        }
        Scanner {
            points,
            forest: Forest::new(params.delta),
            state: PhaseState::new(),
            clusters: Vec::new(),
            time_start: f64::NEG_INFINITY,
            time_end: f64::NEG_INFINITY,
            active: None,
            params,
            distance,
        }
    }

    fn scan(&mut self) {
        let keys: Vec<Obs> = self.points.keys().collect();
        for p in keys {
            self.step(p);
        }
        if let Some(active) = self.active.take() {
            self.add_cluster(active);
        }
    }

    /// Process one observation.
    fn step(&mut self, p: Obs) {
        let geom = self.points[p].geom;
        let time = self.points[p].time;
        let env = Envelope::around(geom, self.params.eps, self.distance);

        // Gather the candidates from the current phase's noise set and from
        // the logged regions first visited after the frame start.
        let (log, noise) = if self.active.is_some() {
            (&self.state.expansion_log, &self.state.expansion_noise)
        } else {
            (&self.state.look_up_log, &self.state.look_up_noise)
        };
        let mut candidates: BTreeSet<Obs> = BTreeSet::new();
        for &q in noise {
            if env.outer.contains_point(self.points[q].geom) {
                candidates.insert(q);
            }
        }
        for &r in log {
            if self.forest.in_time_frame(r, self.time_start) {
                self.forest.query(r, &env.outer, &self.points, &mut candidates);
            }
        }

        // Keep the candidates inside the inner square or within eps.
        let mut neighborhood: Vec<Obs> = candidates
            .iter()
            .copied()
            .filter(|&q| {
                let qg = self.points[q].geom;
                env.inner.map_or(false, |inner| inner.contains_point(qg))
                    || self.distance.measure(geom, qg) <= self.params.eps
            })
            .collect();
        neighborhood.push(p);

        if let Some(active) = self.active {
            if self.expand_active(active, p, &neighborhood) {
                self.time_end = time;
                self.state.clear_look_up();
                self.active = Some(self.forest.walk(active));
                return;
            }
        }

        // Look-up: only the neighbors observed after the active frame count.
        let recent: Vec<Obs> = neighborhood
            .iter()
            .copied()
            .filter(|&q| {
                let t = self.points[q].time;
                self.time_end < t && t <= time
            })
            .collect();
        if let Some(found) = self.find_cluster(p, &recent) {
            debug!("cluster transition at {} ({})", p, found);
            if let Some(active) = self.active {
                self.add_cluster(active);
            }
            self.time_start = self.time_end;
            self.time_end = time;
            self.active = Some(self.forest.walk(found));
            self.state.promote();
        }
    }

    /// Try to absorb `p` into the active cluster. Returns true if `p` is a
    /// member of the cluster after the neighborhood update.
    fn expand_active(&mut self, active: Reg, p: Obs, neighborhood: &[Obs]) -> bool {
        self.state.phase = Phase::Expansion;
        self.state.expansion_noise.insert(p);
        self.points.update_neighbors(
            p,
            neighborhood,
            self.params.n,
            self.time_start,
            &mut self.forest,
            &mut self.state,
        );
        if self.forest[active].start_context != self.time_start {
            panic!(
                "active cluster {} belongs to frame {}, not the current frame {}",
                active, self.forest[active].start_context, self.time_start
            );
        }
        self.forest.contains(self.forest.walk(active), p)
    }

    /// Probe for a persistent region around `p`. Returns the first one in
    /// region id order, if any.
    fn find_cluster(&mut self, p: Obs, neighborhood: &[Obs]) -> Option<Reg> {
        self.state.phase = Phase::LookUp;
        self.state.look_up_noise.insert(p);
        self.points.update_neighbors(
            p,
            neighborhood,
            self.params.n,
            self.time_end,
            &mut self.forest,
            &mut self.state,
        );
        self.points
            .get_regions(p, self.time_end, &self.forest)
            .into_iter()
            .find(|&r| self.forest[r].persistent)
    }

    /// Add the final form of a cluster to the result set.
    fn add_cluster(&mut self, cluster: Reg) {
        let representative = self.forest.walk(cluster);
        if !self.clusters.contains(&representative) {
            self.clusters.push(representative);
        }
    }

    /// Label every point with its cluster, classify the non-clustered
    /// stretches, count excursions, and rank members by density.
    fn analyze(&mut self) {
        let Scanner {
            points,
            forest,
            clusters,
            ..
        } = self;

        for &cluster in clusters.iter() {
            let members: Vec<Obs> = forest[cluster].points.iter().copied().collect();
            for p in members {
                points[p].cluster = Some(cluster);
            }
        }

        // Forward pass: the cluster last seen before each noise point.
        let mut prev: Option<Reg> = None;
        let keys: Vec<Obs> = points.keys().collect();
        for &p in &keys {
            match points[p].cluster {
                None => points[p].prev = prev,
                Some(c) => prev = Some(c),
            }
        }

        // Reverse pass: the cluster next seen after each noise point. A
        // noise point enclosed by the same cluster on both sides is an
        // excursion and charges that cluster.
        let mut next: Option<Reg> = None;
        for &p in keys.iter().rev() {
            match points[p].cluster {
                None => {
                    points[p].next = next;
                    if let Some(n) = next {
                        if points[p].prev == Some(n) {
                            forest[n].noise += 1;
                        }
                    }
                }
                Some(c) => next = Some(c),
            }
        }

        // Dense rank of the neighborhood sizes within each cluster.
        for &cluster in clusters.iter() {
            let members: Vec<Obs> = forest[cluster].points.iter().copied().collect();
            let sizes: BTreeSet<usize> = members.iter().map(|&p| points[p].neighbors.len()).collect();
            for &p in &members {
                let size = points[p].neighbors.len();
                let rank = sizes.iter().rev().position(|&s| s == size).map_or(0, |i| i + 1);
                points[p].density_rank = rank;
            }
        }
    }
}
