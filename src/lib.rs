// Copyright (c) 2017-2021 Fabian Schuiki

//! Stop-and-move segmentation of movement trajectories.
//!
//! This library segments the observation sequence of a single moving object
//! into an alternating series of *stops*, the persistent residences where
//! the object kept returning, and *moves*, the stretches between them. The
//! scan is a streaming density clustering: observations are admitted one at
//! a time in timestamp order, dense neighborhoods grow into regions, and
//! regions whose accumulated presence reaches a threshold become stops.

#[macro_use]
extern crate log;

pub mod config;
pub mod descriptor;
pub mod geom;
pub mod output;
pub mod point;
pub mod range;
pub mod region;
pub mod scan;
pub mod table;
pub mod traj;

pub use crate::config::Config;
pub use crate::descriptor::TimeDescriptor;
pub use crate::geom::{Coord, Distance, Rect};
pub use crate::output::{ClassRow, PointKind, StopRow, TimeFormat};
pub use crate::point::Obs;
pub use crate::range::SimpleRange;
pub use crate::region::Reg;
pub use crate::scan::{Params, ScanResult, SeqScan};
pub use crate::traj::{Observation, Trajectory};
