use seqscan::{Observation, Params, PointKind, ScanResult, SeqScan, Trajectory};

/// Build a cartesian trajectory from raw `(x, y, t)` triples.
fn trajectory(points: &[(f64, f64, f64)]) -> Trajectory {
    let obs = points
        .iter()
        .map(|&(x, y, time)| Observation { x, y, time })
        .collect();
    Trajectory::new(obs, true, None).unwrap()
}

fn run(points: &[(f64, f64, f64)], eps: f64, n: usize, delta: f64) -> ScanResult {
    SeqScan::new(&trajectory(points), Params { eps, n, delta }).run()
}

#[test]
fn single_cluster() {
    let result = run(
        &[(0.0, 0.0, 0.0), (0.0, 0.0, 10.0), (0.0, 0.0, 20.0), (0.0, 0.0, 30.0)],
        1.0,
        2,
        15.0,
    );
    assert_eq!(result.num_stops(), 1);
    for row in &result.classification {
        assert_eq!(row.class, "STOP_1");
        assert_eq!(row.kind, PointKind::Cluster);
        assert_eq!(row.cluster, 1);
    }
    let stop = &result.stops[0];
    assert_eq!(stop.stop_id, "STOP_1");
    assert_eq!(stop.start_time, 0.0);
    assert_eq!(stop.end_time, 30.0);
    assert_eq!(stop.centroid.x, 0.0);
    assert_eq!(stop.centroid.y, 0.0);
}

#[test]
fn pure_noise() {
    let result = run(
        &[(0.0, 0.0, 0.0), (100.0, 0.0, 1.0), (200.0, 0.0, 2.0)],
        1.0,
        2,
        5.0,
    );
    assert_eq!(result.num_stops(), 0);
    for row in &result.classification {
        assert_eq!(row.class, "MOVE");
        assert_eq!(row.kind, PointKind::Noise);
        assert_eq!(row.cluster, -1);
    }
}

#[test]
fn excursion_returns_to_the_same_stop() {
    let result = run(
        &[
            (0.0, 0.0, 0.0),
            (0.0, 0.0, 10.0),
            (0.0, 0.0, 20.0),
            (50.0, 0.0, 25.0),
            (0.0, 0.0, 30.0),
            (0.0, 0.0, 40.0),
        ],
        1.0,
        2,
        15.0,
    );
    assert_eq!(result.num_stops(), 1);
    let sortie = &result.classification[3];
    assert_eq!(sortie.time, 25.0);
    assert_eq!(sortie.class, "MOVE");
    assert_eq!(sortie.kind, PointKind::Excursion);
    assert_eq!(sortie.details, "of cluster 1");
    assert_eq!(sortie.cluster, -1);
    assert_eq!(result.stops[0].excursions, 1);
    assert_eq!(result.stops[0].start_time, 0.0);
    assert_eq!(result.stops[0].end_time, 40.0);
    for row in result.classification.iter().filter(|r| r.time != 25.0) {
        assert_eq!(row.kind, PointKind::Cluster);
    }
}

#[test]
fn transition_between_two_stops() {
    let result = run(
        &[
            (0.0, 0.0, 0.0),
            (0.0, 0.0, 10.0),
            (0.0, 0.0, 20.0),
            (50.0, 0.0, 40.0),
            (50.0, 0.0, 45.0),
            (100.0, 0.0, 60.0),
            (100.0, 0.0, 70.0),
            (100.0, 0.0, 80.0),
        ],
        1.0,
        2,
        15.0,
    );
    assert_eq!(result.num_stops(), 2);
    for row in &result.classification[0..3] {
        assert_eq!(row.class, "STOP_1");
    }
    for row in &result.classification[3..5] {
        assert_eq!(row.class, "MOVE");
        assert_eq!(row.kind, PointKind::Transition);
        assert_eq!(row.details, "from cluster 1");
    }
    for row in &result.classification[5..8] {
        assert_eq!(row.class, "STOP_2");
        assert_eq!(row.cluster, 2);
    }
    assert_eq!(result.stops[0].stop_id, "STOP_1");
    assert_eq!(result.stops[0].start_time, 0.0);
    assert_eq!(result.stops[0].end_time, 20.0);
    assert_eq!(result.stops[1].stop_id, "STOP_2");
    assert_eq!(result.stops[1].start_time, 60.0);
    assert_eq!(result.stops[1].end_time, 80.0);
    assert_eq!(result.stops[1].centroid.x, 100.0);
}

#[test]
fn noise_before_and_after_all_stops() {
    let result = run(
        &[
            (50.0, 0.0, 0.0),
            (50.0, 0.0, 1.0),
            (0.0, 0.0, 10.0),
            (0.0, 0.0, 20.0),
            (0.0, 0.0, 30.0),
            (50.0, 0.0, 100.0),
            (50.0, 0.0, 101.0),
        ],
        1.0,
        2,
        15.0,
    );
    assert_eq!(result.num_stops(), 1);
    for row in &result.classification[0..2] {
        assert_eq!(row.kind, PointKind::Noise);
        assert_eq!(row.details, "before/after clustering");
    }
    for row in &result.classification[2..5] {
        assert_eq!(row.kind, PointKind::Cluster);
    }
    for row in &result.classification[5..7] {
        assert_eq!(row.kind, PointKind::Noise);
        assert_eq!(row.details, "before/after clustering");
    }
}

#[test]
fn haversine_neighborhoods() {
    // 0.001 degrees of longitude at the equator is roughly 111 meters.
    let obs = vec![
        Observation { x: 0.0, y: 0.0, time: 0.0 },
        Observation { x: 0.0, y: 0.001, time: 10.0 },
    ];
    let traj = Trajectory::new(obs, false, None).unwrap();

    let wide = SeqScan::new(&traj, Params { eps: 200.0, n: 2, delta: 5.0 }).run();
    assert_eq!(wide.num_stops(), 1);
    assert_eq!(wide.stops[0].start_time, 0.0);
    assert_eq!(wide.stops[0].end_time, 10.0);

    let narrow = SeqScan::new(&traj, Params { eps: 50.0, n: 2, delta: 5.0 }).run();
    assert_eq!(narrow.num_stops(), 0);
}

#[test]
fn stops_satisfy_the_presence_threshold() {
    let delta = 15.0;
    let result = run(
        &[
            (0.0, 0.0, 0.0),
            (0.0, 0.0, 10.0),
            (0.0, 0.0, 20.0),
            (50.0, 0.0, 40.0),
            (50.0, 0.0, 45.0),
            (100.0, 0.0, 60.0),
            (100.0, 0.0, 70.0),
            (100.0, 0.0, 80.0),
        ],
        1.0,
        2,
        delta,
    );
    for stop in &result.stops {
        assert!(stop.end_time - stop.start_time >= delta);
    }
}

#[test]
fn equal_timestamps_are_accepted() {
    let result = run(
        &[
            (0.0, 0.0, 0.0),
            (0.0, 0.0, 10.0),
            (0.0, 0.0, 10.0),
            (0.0, 0.0, 20.0),
        ],
        1.0,
        2,
        15.0,
    );
    assert_eq!(result.num_stops(), 1);
    assert_eq!(result.classification.len(), 4);
}

#[test]
fn rescanning_is_deterministic() {
    let points = [
        (0.0, 0.0, 0.0),
        (0.0, 0.0, 10.0),
        (0.2, 0.1, 20.0),
        (30.0, 0.0, 25.0),
        (0.1, 0.0, 30.0),
        (0.0, 0.2, 40.0),
        (60.0, 0.0, 50.0),
        (60.0, 0.1, 60.0),
        (60.0, 0.0, 75.0),
    ];
    let a = run(&points, 1.0, 2, 15.0);
    let b = run(&points, 1.0, 2, 15.0);
    assert_eq!(a.classification.len(), b.classification.len());
    for (ra, rb) in a.classification.iter().zip(&b.classification) {
        assert_eq!(ra.class, rb.class);
        assert_eq!(ra.kind, rb.kind);
        assert_eq!(ra.cluster, rb.cluster);
        assert_eq!(ra.details, rb.details);
    }
    assert_eq!(a.stops.len(), b.stops.len());
    for (sa, sb) in a.stops.iter().zip(&b.stops) {
        assert_eq!(sa.stop_id, sb.stop_id);
        assert_eq!(sa.start_time, sb.start_time);
        assert_eq!(sa.end_time, sb.end_time);
        assert_eq!(sa.centroid, sb.centroid);
    }
}
