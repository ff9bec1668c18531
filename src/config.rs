// Copyright (c) 2017-2021 Fabian Schuiki

//! Run configuration.
//!
//! The configuration describes how trajectory files are laid out: the CSV
//! column names, the timestamp format, the coordinate interpretation, and
//! the unit of the presence threshold given on the command line.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs::File, path::Path};

/// The CSV column names of the input files.
#[derive(Debug, Clone, Deserialize)]
pub struct Columns {
    /// Column holding the trajectory identifier.
    #[serde(rename = "TAG_COLUMN")]
    pub tag: String,
    /// Column holding the observation timestamp.
    #[serde(rename = "TIME_COLUMN")]
    pub time: String,
    /// Column holding the x coordinate (latitude for geographic input).
    #[serde(rename = "X_COLUMN")]
    pub x: String,
    /// Column holding the y coordinate (longitude for geographic input).
    #[serde(rename = "Y_COLUMN")]
    pub y: String,
}

impl Default for Columns {
    fn default() -> Self {
        Columns {
            tag: "tag".into(),
            time: "time".into(),
            x: "x".into(),
            y: "y".into(),
        }
    }
}

/// The unit of the presence threshold parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TimeUnit {
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "min")]
    Minutes,
    #[serde(rename = "d")]
    Days,
}

impl TimeUnit {
    /// Convert a threshold in this unit to seconds.
    pub fn to_seconds(self, delta: f64) -> f64 {
        match self {
            TimeUnit::Seconds => delta,
            TimeUnit::Minutes => delta * 60.0,
            TimeUnit::Days => delta * 3600.0 * 24.0,
        }
    }
}

impl Default for TimeUnit {
    fn default() -> Self {
        TimeUnit::Seconds
    }
}

/// Units of the command line parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Units {
    #[serde(rename = "TIME", default)]
    pub time: TimeUnit,
}

/// The run configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// CSV column names.
    #[serde(rename = "CSV_columns", default)]
    pub columns: Columns,
    /// Timestamp format in chrono syntax; epoch seconds when absent.
    #[serde(rename = "TIMESTAMP_FORMAT", default)]
    pub timestamp_format: Option<String>,
    /// Plane coordinates when true, latitude/longitude otherwise.
    #[serde(rename = "is_cartesian")]
    pub cartesian: bool,
    /// Units of the command line parameters.
    #[serde(rename = "UNITS", default)]
    pub units: Units,
}

impl Config {
    /// Load a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("cannot open config file {}", path.display()))?;
        serde_json::from_reader(file)
            .with_context(|| format!("malformed config file {}", path.display()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            columns: Default::default(),
            timestamp_format: None,
            cartesian: true,
            units: Default::default(),
        }
    }
}
