// Copyright (c) 2017-2021 Fabian Schuiki

//! Trajectory input.
//!
//! A trajectory is the ordered sequence of observations of one moving
//! object. The loaders read observations from CSV using the configured
//! column names, validate geographic coordinates, and sort by timestamp.
//! The sort is stable, so observations with equal timestamps keep their
//! file order.

use crate::config::Config;
use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::io::Read;

/// A raw observation of a moving object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// The x coordinate (latitude for geographic trajectories).
    pub x: f64,
    /// The y coordinate (longitude for geographic trajectories).
    pub y: f64,
    /// The observation instant, in seconds.
    pub time: f64,
}

/// The observation sequence of one moving object.
#[derive(Debug, Clone)]
pub struct Trajectory {
    points: Vec<Observation>,
    /// Opaque identifier of the object, if any.
    pub tag_id: Option<String>,
    /// Plane coordinates when true, latitude/longitude otherwise.
    pub cartesian: bool,
}

impl Trajectory {
    /// Create a trajectory from raw observations.
    ///
    /// Geographic coordinates are validated and the observations sorted by
    /// timestamp. Rejects the whole trajectory on an illegal coordinate.
    pub fn new(
        mut points: Vec<Observation>,
        cartesian: bool,
        tag_id: Option<String>,
    ) -> Result<Self> {
        if !cartesian {
            for (i, p) in points.iter().enumerate() {
                if !(-90.0..=90.0).contains(&p.x) || !(-180.0..=180.0).contains(&p.y) {
                    bail!(
                        "illegal latitude or longitude ({}, {}) at observation {}",
                        p.x,
                        p.y,
                        i
                    );
                }
            }
        }
        points.sort_by(|a, b| a.time.total_cmp(&b.time));
        Ok(Trajectory {
            points,
            tag_id,
            cartesian,
        })
    }

    /// Return the number of observations.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check whether the trajectory holds no observation.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Return the observations in timestamp order.
    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.points.iter()
    }

    /// Read a single trajectory from CSV.
    ///
    /// The tag is taken from the first row when the tag column is present.
    pub fn from_csv_reader<R: Read>(reader: R, config: &Config) -> Result<Trajectory> {
        let mut csv = csv::Reader::from_reader(reader);
        let layout = Layout::resolve(&mut csv, config)?;
        let mut points = Vec::new();
        let mut tag_id = None;
        for (i, record) in csv.records().enumerate() {
            let record = record.with_context(|| format!("malformed CSV row {}", i + 2))?;
            points.push(layout.observation(&record, i, config)?);
            if tag_id.is_none() {
                tag_id = layout.tag(&record);
            }
        }
        Trajectory::new(points, config.cartesian, tag_id)
    }

    /// Read the observation groups of a multi-trajectory file from CSV,
    /// keyed by the tag column. Groups are returned in order of first
    /// appearance, so each can be validated and rejected individually.
    pub fn groups_from_csv_reader<R: Read>(
        reader: R,
        config: &Config,
    ) -> Result<Vec<(String, Vec<Observation>)>> {
        let mut csv = csv::Reader::from_reader(reader);
        let layout = Layout::resolve(&mut csv, config)?;
        if layout.tag.is_none() {
            bail!("multi-trajectory input requires a `{}` column", config.columns.tag);
        }
        let mut groups: Vec<(String, Vec<Observation>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, record) in csv.records().enumerate() {
            let record = record.with_context(|| format!("malformed CSV row {}", i + 2))?;
            let tag = layout
                .tag(&record)
                .ok_or_else(|| anyhow!("missing tag in CSV row {}", i + 2))?;
            let obs = layout.observation(&record, i, config)?;
            let slot = *index.entry(tag.clone()).or_insert_with(|| {
                groups.push((tag, Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(obs);
        }
        Ok(groups)
    }

    /// Read a multi-trajectory file from CSV, grouping rows by the tag
    /// column. Fails on the first invalid trajectory.
    pub fn many_from_csv_reader<R: Read>(reader: R, config: &Config) -> Result<Vec<Trajectory>> {
        Trajectory::groups_from_csv_reader(reader, config)?
            .into_iter()
            .map(|(tag, points)| Trajectory::new(points, config.cartesian, Some(tag)))
            .collect()
    }
}

/// Resolved column positions of a CSV file.
struct Layout {
    x: usize,
    y: usize,
    time: usize,
    tag: Option<usize>,
}

impl Layout {
    fn resolve<R: Read>(csv: &mut csv::Reader<R>, config: &Config) -> Result<Self> {
        let headers = csv.headers().context("cannot read CSV header")?;
        let find = |name: &str| headers.iter().position(|h| h == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| anyhow!("missing CSV column `{}`", name))
        };
        Ok(Layout {
            x: require(&config.columns.x)?,
            y: require(&config.columns.y)?,
            time: require(&config.columns.time)?,
            tag: find(&config.columns.tag),
        })
    }

    fn observation(&self, record: &csv::StringRecord, i: usize, config: &Config) -> Result<Observation> {
        let field = |idx: usize| {
            record
                .get(idx)
                .ok_or_else(|| anyhow!("short CSV row {}", i + 2))
        };
        let x = field(self.x)?
            .trim()
            .parse::<f64>()
            .with_context(|| format!("bad x coordinate in CSV row {}", i + 2))?;
        let y = field(self.y)?
            .trim()
            .parse::<f64>()
            .with_context(|| format!("bad y coordinate in CSV row {}", i + 2))?;
        let time = parse_time(field(self.time)?, &config.timestamp_format)
            .with_context(|| format!("bad timestamp in CSV row {}", i + 2))?;
        Ok(Observation { x, y, time })
    }

    fn tag(&self, record: &csv::StringRecord) -> Option<String> {
        self.tag
            .and_then(|idx| record.get(idx))
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
    }
}

/// Parse a timestamp field into seconds.
///
/// Uses the configured chrono format when present, plain epoch seconds
/// otherwise.
fn parse_time(field: &str, format: &Option<String>) -> Result<f64> {
    let field = field.trim();
    match format {
        Some(pattern) => {
            let dt = NaiveDateTime::parse_from_str(field, pattern)
                .with_context(|| format!("`{}` does not match `{}`", field, pattern))?;
            Ok(dt.timestamp() as f64 + dt.timestamp_subsec_nanos() as f64 * 1e-9)
        }
        None => field
            .parse::<f64>()
            .with_context(|| format!("`{}` is not a number of seconds", field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn config() -> Config {
        Config::default()
    }

    #[test]
    fn loads_and_sorts_a_single_trajectory() {
        let data = indoc!(
            "
            x,y,time
            1.0,2.0,30
            0.0,0.0,10
            0.5,0.5,20
        "
        );
        let traj = Trajectory::from_csv_reader(data.as_bytes(), &config()).unwrap();
        assert_eq!(traj.len(), 3);
        let times: Vec<f64> = traj.iter().map(|o| o.time).collect();
        assert_eq!(times, vec![10.0, 20.0, 30.0]);
        assert_eq!(traj.tag_id, None);
    }

    #[test]
    fn stable_sort_keeps_tie_order() {
        let points = vec![
            Observation { x: 1.0, y: 0.0, time: 5.0 },
            Observation { x: 2.0, y: 0.0, time: 5.0 },
            Observation { x: 0.0, y: 0.0, time: 1.0 },
        ];
        let traj = Trajectory::new(points, true, None).unwrap();
        let xs: Vec<f64> = traj.iter().map(|o| o.x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn picks_up_the_tag_column() {
        let data = indoc!(
            "
            x,y,time,tag
            0.0,0.0,0,gull42
            0.0,0.0,10,gull42
        "
        );
        let traj = Trajectory::from_csv_reader(data.as_bytes(), &config()).unwrap();
        assert_eq!(traj.tag_id.as_deref(), Some("gull42"));
    }

    #[test]
    fn groups_a_multi_trajectory_file() {
        let data = indoc!(
            "
            x,y,time,tag
            0.0,0.0,0,a
            1.0,1.0,0,b
            0.0,0.0,10,a
            1.0,1.0,10,b
        "
        );
        let trajs = Trajectory::many_from_csv_reader(data.as_bytes(), &config()).unwrap();
        assert_eq!(trajs.len(), 2);
        assert_eq!(trajs[0].tag_id.as_deref(), Some("a"));
        assert_eq!(trajs[1].tag_id.as_deref(), Some("b"));
        assert_eq!(trajs[0].len(), 2);
    }

    #[test]
    fn rejects_illegal_geographic_coordinates() {
        let points = vec![Observation { x: 91.0, y: 0.0, time: 0.0 }];
        assert!(Trajectory::new(points, false, None).is_err());
        let points = vec![Observation { x: 0.0, y: -190.0, time: 0.0 }];
        assert!(Trajectory::new(points, false, None).is_err());
        let points = vec![Observation { x: 45.0, y: 90.0, time: 0.0 }];
        assert!(Trajectory::new(points, false, None).is_ok());
    }

    #[test]
    fn parses_formatted_timestamps() {
        let mut config = config();
        config.timestamp_format = Some("%Y-%m-%d %H:%M:%S".into());
        let data = indoc!(
            "
            x,y,time
            0.0,0.0,1970-01-01 00:00:30
        "
        );
        let traj = Trajectory::from_csv_reader(data.as_bytes(), &config).unwrap();
        assert_eq!(traj.iter().next().unwrap().time, 30.0);
    }

    #[test]
    fn rejects_missing_columns() {
        let data = "a,b\n1,2\n";
        assert!(Trajectory::from_csv_reader(data.as_bytes(), &config()).is_err());
    }
}
