// Copyright (c) 2017-2021 Fabian Schuiki

//! Output serialization.
//!
//! The scan produces two streams per trajectory: a per-point classification
//! and a symbolic table of the discovered stops. This module builds the row
//! types from the scan state and writes them as CSV to any `io::Write`.

use crate::{
    config::Columns,
    geom::Coord,
    point::{Obs, Points},
    region::{Forest, Reg},
};
use anyhow::Result;
use chrono::NaiveDateTime;
use std::io::Write;

/// The classification of a single observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointKind {
    /// A sortie outside a cluster that returns to it.
    Excursion,
    /// A stretch between two different clusters.
    Transition,
    /// Unclassified points before or after all clusters.
    Noise,
    /// A member of a stop.
    Cluster,
}

impl std::fmt::Display for PointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            PointKind::Excursion => "excursion",
            PointKind::Transition => "transition",
            PointKind::Noise => "noise",
            PointKind::Cluster => "cluster",
        };
        write!(f, "{}", s)
    }
}

/// One row of the per-point classification stream.
#[derive(Debug, Clone)]
pub struct ClassRow {
    pub x: f64,
    pub y: f64,
    pub time: f64,
    pub tag: Option<String>,
    /// Running stop counter, or -1 for non-cluster rows.
    pub cluster: i64,
    /// `MOVE` or `STOP_k`.
    pub class: String,
    pub kind: PointKind,
    /// Human readable suffix naming the neighboring stop.
    pub details: String,
}

/// One row of the symbolic stops stream.
#[derive(Debug, Clone)]
pub struct StopRow {
    pub tag: Option<String>,
    /// `STOP_i`, counted from 1 in chronological order.
    pub stop_id: String,
    pub start_time: f64,
    pub end_time: f64,
    pub centroid: Coord,
    /// Number of excursion points charged against this stop.
    pub excursions: u32,
}

/// Build the classification stream over the scanned points.
///
/// The stop counter runs over the clusters in order of first appearance;
/// excursion and transition rows name the stop they depart from.
pub fn classification_rows(points: &Points, tag: Option<&str>) -> Vec<ClassRow> {
    let mut rows = Vec::with_capacity(points.len());
    let mut counter: i64 = 0;
    let mut current: Option<Reg> = None;
    for p in points.keys() {
        let data = &points[p];
        let (cluster, class, kind, details) = match (data.cluster, data.prev, data.next) {
            (None, Some(prev), Some(next)) if prev == next => (
                -1,
                "MOVE".to_owned(),
                PointKind::Excursion,
                format!("of cluster {}", counter),
            ),
            (None, Some(_), Some(_)) => (
                -1,
                "MOVE".to_owned(),
                PointKind::Transition,
                format!("from cluster {}", counter),
            ),
            (Some(c), ..) => {
                if current != Some(c) {
                    counter += 1;
                    current = Some(c);
                }
                (
                    counter,
                    format!("STOP_{}", counter),
                    PointKind::Cluster,
                    format!("cluster # {}", counter),
                )
            }
            _ => (
                -1,
                "MOVE".to_owned(),
                PointKind::Noise,
                "before/after clustering".to_owned(),
            ),
        };
        rows.push(ClassRow {
            x: data.geom.x,
            y: data.geom.y,
            time: data.time,
            tag: tag.map(str::to_owned),
            cluster,
            class,
            kind,
            details,
        });
    }
    rows
}

/// Build the symbolic stops stream over the final clusters.
pub fn stop_rows(points: &Points, forest: &Forest, clusters: &[Reg], tag: Option<&str>) -> Vec<StopRow> {
    clusters
        .iter()
        .enumerate()
        .map(|(i, &cluster)| {
            let start_time = forest
                .first_timestamp(cluster)
                .expect("final cluster has an empty time descriptor");
            let end_time = forest
                .last_timestamp(cluster)
                .expect("final cluster has an empty time descriptor");
            StopRow {
                tag: tag.map(str::to_owned),
                stop_id: format!("STOP_{}", i + 1),
                start_time,
                end_time,
                centroid: forest.centroid(cluster, points),
                excursions: forest[cluster].noise,
            }
        })
        .collect()
}

/// How timestamps are rendered in the output files.
#[derive(Debug, Clone)]
pub enum TimeFormat {
    /// Plain seconds.
    Seconds,
    /// A chrono format string applied to the epoch timestamp.
    Pattern(String),
}

impl TimeFormat {
    /// Render a timestamp in seconds.
    pub fn render(&self, t: f64) -> String {
        match self {
            TimeFormat::Seconds => format!("{}", t),
            TimeFormat::Pattern(pattern) => {
                let secs = t.floor();
                let nanos = ((t - secs) * 1e9).round() as u32;
                match NaiveDateTime::from_timestamp_opt(secs as i64, nanos.min(999_999_999)) {
                    Some(dt) => dt.format(pattern).to_string(),
                    None => format!("{}", t),
                }
            }
        }
    }
}

/// Write the classification stream as CSV.
pub fn write_classification<W: Write>(
    writer: W,
    rows: &[ClassRow],
    columns: &Columns,
    format: &TimeFormat,
) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    let tagged = rows.iter().any(|row| row.tag.is_some());
    let mut header = vec![
        columns.x.as_str(),
        columns.y.as_str(),
        columns.time.as_str(),
    ];
    if tagged {
        header.push(columns.tag.as_str());
    }
    header.extend(&["cluster", "class", "type", "details"]);
    csv.write_record(&header)?;
    for row in rows {
        let mut record = vec![
            row.x.to_string(),
            row.y.to_string(),
            format.render(row.time),
        ];
        if tagged {
            record.push(row.tag.clone().unwrap_or_default());
        }
        record.push(row.cluster.to_string());
        record.push(row.class.clone());
        record.push(row.kind.to_string());
        record.push(row.details.clone());
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(())
}

/// Write the symbolic stops stream as CSV.
pub fn write_stops<W: Write>(
    writer: W,
    rows: &[StopRow],
    columns: &Columns,
    format: &TimeFormat,
    cartesian: bool,
) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    let (cx, cy) = if cartesian {
        ("centroid_x", "centroid_y")
    } else {
        ("centroid_lat", "centroid_lon")
    };
    csv.write_record(&[columns.tag.as_str(), "stop_id", "start_time", "end_time", cx, cy])?;
    for row in rows {
        csv.write_record(&[
            row.tag.clone().unwrap_or_default(),
            row.stop_id.clone(),
            format.render(row.start_time),
            format.render(row.end_time),
            row.centroid.x.to_string(),
            row.centroid.y.to_string(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}
