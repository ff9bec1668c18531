// Copyright (c) 2017-2021 Fabian Schuiki

#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;

use anyhow::{Context, Result};
use clap::Arg;
use rayon::prelude::*;
use seqscan::{
    config::Config,
    output::{self, TimeFormat},
    scan::{Params, ScanResult, SeqScan},
    traj::Trajectory,
};
use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

fn main() {
    match main_inner() {
        Ok(_) => (),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn main_inner() -> Result<()> {
    let matches = app_from_crate!()
        .about("Segments movement trajectories into stops and moves.")
        .arg(
            Arg::with_name("verbosity")
                .short("v")
                .multiple(true)
                .help(HELP_VERBOSITY.lines().next().unwrap())
                .long_help(HELP_VERBOSITY),
        )
        .arg(
            Arg::with_name("input")
                .help("Trajectory CSV file, or a directory of CSV files")
                .required(true),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .required(true)
                .help("Classification CSV file; a directory when the input is one"),
        )
        .arg(
            Arg::with_name("symbolic")
                .long("symbolic")
                .takes_value(true)
                .help("Symbolic stops CSV file; derived from the output path if omitted"),
        )
        .arg(
            Arg::with_name("eps")
                .short("e")
                .long("eps")
                .value_name("EPS")
                .takes_value(true)
                .required(true)
                .help("Neighborhood radius, in world units"),
        )
        .arg(
            Arg::with_name("neighbors")
                .short("n")
                .long("neighbors")
                .value_name("N")
                .takes_value(true)
                .required(true)
                .help("Minimum neighborhood size of a dense point"),
        )
        .arg(
            Arg::with_name("delta")
                .short("d")
                .long("delta")
                .value_name("DELTA")
                .takes_value(true)
                .required(true)
                .help("Presence threshold, in the configured time unit"),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .takes_value(true)
                .help("JSON configuration file describing the CSV layout"),
        )
        .arg(
            Arg::with_name("multi")
                .long("multi")
                .help("Group the input file into one trajectory per tag"),
        )
        .arg(
            Arg::with_name("single-threaded")
                .short("s")
                .long("no-parallel")
                .help("Do not parallelize execution"),
        )
        .arg(
            Arg::with_name("time-stats")
                .short("t")
                .long("time")
                .help("Print execution time statistics per stage"),
        )
        .get_matches();

    // Configure the logger.
    let verbose = std::cmp::max(1, matches.occurrences_of("verbosity") as usize) - 1;
    let quiet = !matches.is_present("verbosity");
    stderrlog::new()
        .module("seqscan")
        .quiet(quiet)
        .verbosity(verbose)
        .init()
        .unwrap();

    // Configure rayon to be single-threaded if requested.
    if matches.is_present("single-threaded") {
        info!("Limiting to one rayon worker thread");
        rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build_global()
            .unwrap();
    }

    // Prepare the time tracking.
    let mut times = vec![];
    let tinit = time::precise_time_ns();

    // Assemble the run configuration and parameters.
    let config = match matches.value_of("config") {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let delta: f64 = matches
        .value_of("delta")
        .unwrap()
        .parse()
        .context("invalid presence threshold")?;
    let params = Params {
        eps: matches
            .value_of("eps")
            .unwrap()
            .parse()
            .context("invalid neighborhood radius")?,
        n: matches
            .value_of("neighbors")
            .unwrap()
            .parse()
            .context("invalid neighborhood size")?,
        delta: config.units.time.to_seconds(delta),
    };
    let format = match &config.timestamp_format {
        Some(pattern) => TimeFormat::Pattern(pattern.clone()),
        None => TimeFormat::Seconds,
    };

    let input = Path::new(matches.value_of("input").unwrap());
    let output_path = Path::new(matches.value_of("output").unwrap());
    let symbolic_path = matches.value_of("symbolic").map(PathBuf::from);

    if input.is_dir() {
        run_directory(
            input,
            output_path,
            symbolic_path.as_deref(),
            &config,
            params,
            &format,
            &mut times,
        )?;
    } else {
        run_file(
            input,
            output_path,
            symbolic_path.as_deref(),
            matches.is_present("multi"),
            &config,
            params,
            &format,
            &mut times,
        )?;
    }

    // Final time stat.
    let tfinal = time::precise_time_ns();
    times.push(("total".to_owned(), tfinal - tinit));

    // Print execution time statistics if requested by the user.
    if matches.is_present("time-stats") {
        eprintln!("Execution Time Statistics:");
        for (mut name, ns) in times {
            name.push(':');
            eprintln!("  {:10}  {:8.3} ms", name, ns as f64 * 1.0e-6);
        }
    }

    info!("Used {} rayon worker threads", rayon::current_num_threads());

    Ok(())
}

/// Process a single CSV file into one classification and one symbolic file.
fn run_file(
    input: &Path,
    output_path: &Path,
    symbolic_path: Option<&Path>,
    multi: bool,
    config: &Config,
    params: Params,
    format: &TimeFormat,
    times: &mut Vec<(String, u64)>,
) -> Result<()> {
    let t0 = time::precise_time_ns();
    let file = File::open(input).with_context(|| format!("cannot open {}", input.display()))?;
    let trajectories = if multi {
        let groups = Trajectory::groups_from_csv_reader(file, config)
            .with_context(|| format!("cannot load {}", input.display()))?;
        let mut trajectories = Vec::with_capacity(groups.len());
        for (tag, points) in groups {
            match Trajectory::new(points, config.cartesian, Some(tag.clone())) {
                Ok(trajectory) => trajectories.push(trajectory),
                Err(e) => error!("skipping trajectory {}: {:#}", tag, e),
            }
        }
        trajectories
    } else {
        vec![Trajectory::from_csv_reader(file, config)
            .with_context(|| format!("cannot load {}", input.display()))?]
    };
    let t1 = time::precise_time_ns();
    times.push(("load".to_owned(), t1 - t0));

    let results = run_scans(&trajectories, params);
    let t2 = time::precise_time_ns();
    times.push(("scan".to_owned(), t2 - t1));

    let symbolic = match symbolic_path {
        Some(path) => path.to_path_buf(),
        None => derive_symbolic_path(output_path),
    };
    write_outputs(output_path, &symbolic, &results, config, format)?;
    let t3 = time::precise_time_ns();
    times.push(("output".to_owned(), t3 - t2));
    Ok(())
}

/// Process every CSV file of a directory, one output pair per file.
fn run_directory(
    input: &Path,
    output_dir: &Path,
    symbolic_dir: Option<&Path>,
    config: &Config,
    params: Params,
    format: &TimeFormat,
    times: &mut Vec<(String, u64)>,
) -> Result<()> {
    let t0 = time::precise_time_ns();
    let mut files: Vec<PathBuf> = std::fs::read_dir(input)
        .with_context(|| format!("cannot read directory {}", input.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().map_or(false, |ext| ext == "csv"))
        .collect();
    files.sort();

    let symbolic_dir = match symbolic_dir {
        Some(dir) => dir.to_path_buf(),
        None => output_dir.join("symbolic"),
    };
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("cannot create {}", output_dir.display()))?;
    std::fs::create_dir_all(&symbolic_dir)
        .with_context(|| format!("cannot create {}", symbolic_dir.display()))?;

    let failures: usize = files
        .par_iter()
        .map(|path| {
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
            let name = name.unwrap_or_else(|| "trajectory.csv".to_owned());
            let output_path = output_dir.join(format!("output_{}", name));
            let symbolic_path = symbolic_dir.join(format!("output_symbolic_{}", name));
            match process_one_file(path, &output_path, &symbolic_path, config, params, format) {
                Ok(()) => 0,
                Err(e) => {
                    error!("{}: {:#}", path.display(), e);
                    1
                }
            }
        })
        .sum();
    if failures > 0 {
        warn!("{} of {} trajectory files failed", failures, files.len());
    }
    let t1 = time::precise_time_ns();
    times.push(("process".to_owned(), t1 - t0));
    Ok(())
}

fn process_one_file(
    input: &Path,
    output_path: &Path,
    symbolic_path: &Path,
    config: &Config,
    params: Params,
    format: &TimeFormat,
) -> Result<()> {
    let file = File::open(input).with_context(|| format!("cannot open {}", input.display()))?;
    let trajectory = Trajectory::from_csv_reader(file, config)
        .with_context(|| format!("cannot load {}", input.display()))?;
    let results = run_scans(std::slice::from_ref(&trajectory), params);
    write_outputs(output_path, symbolic_path, &results, config, format)
}

/// Scan the trajectories, fanning out across the rayon worker pool.
fn run_scans(trajectories: &[Trajectory], params: Params) -> Vec<ScanResult> {
    trajectories
        .par_iter()
        .map(|trajectory| {
            let t0 = time::precise_time_ns();
            let result = SeqScan::new(trajectory, params).run();
            let t1 = time::precise_time_ns();
            info!(
                "{}: {} observations, {} stops, {:.3} ms",
                trajectory.tag_id.as_deref().unwrap_or("(untagged)"),
                trajectory.len(),
                result.num_stops(),
                (t1 - t0) as f64 * 1.0e-6,
            );
            result
        })
        .collect()
}

/// Write the combined output streams of one or more scans.
fn write_outputs(
    output_path: &Path,
    symbolic_path: &Path,
    results: &[ScanResult],
    config: &Config,
    format: &TimeFormat,
) -> Result<()> {
    let classification: Vec<_> = results
        .iter()
        .flat_map(|r| r.classification.iter().cloned())
        .collect();
    let stops: Vec<_> = results.iter().flat_map(|r| r.stops.iter().cloned()).collect();

    let output = File::create(output_path)
        .with_context(|| format!("cannot create {}", output_path.display()))?;
    output::write_classification(
        BufWriter::with_capacity(1 << 20, output),
        &classification,
        &config.columns,
        format,
    )
    .with_context(|| format!("cannot write {}", output_path.display()))?;

    let symbolic = File::create(symbolic_path)
        .with_context(|| format!("cannot create {}", symbolic_path.display()))?;
    output::write_stops(
        BufWriter::with_capacity(1 << 20, symbolic),
        &stops,
        &config.columns,
        format,
        config.cartesian,
    )
    .with_context(|| format!("cannot write {}", symbolic_path.display()))?;
    Ok(())
}

/// Place the symbolic stops next to the classification output.
fn derive_symbolic_path(output_path: &Path) -> PathBuf {
    let name = output_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output.csv".to_owned());
    output_path.with_file_name(format!("symbolic_{}", name))
}

static HELP_VERBOSITY: &str = "Increase message verbosity

This option can be specified multiple times to increase the level of verbosity \
in the output:

-v      Only print errors
-vv     Also print warnings
-vvv    Also print info messages
-vvvv   Also print debug messages
-vvvvv  Also print detailed tracing messages
";
