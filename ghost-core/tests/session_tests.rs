use ghost_core::{
    CoachConfig, CoachSession, GhostLap, Lap, SessionOutput, SourceEvent, TelemetrySample,
    TrackGeometry,
};
use std::sync::Arc;

/// Time at `d` for a driver who drops to 40 m/s between 1200 m and 1600 m
fn slow_in_middle(d: f64) -> f64 {
    if d <= 1200.0 {
        d / 50.0
    } else if d <= 1600.0 {
        24.0 + (d - 1200.0) / 40.0
    } else {
        34.0 + (d - 1600.0) / 50.0
    }
}

fn lap_from(index: usize, start: f64, time_at: impl Fn(f64) -> f64) -> Lap {
    let samples = (0..=600)
        .map(|i| {
            let d = i as f64 * 5.0;
            TelemetrySample::at(start + time_at(d), d, 50.0)
        })
        .collect();
    Lap::new(index, samples, true)
}

fn three_sector_session() -> CoachSession {
    let track = Arc::new(TrackGeometry::even("Test Circuit", ghost_core::units::Meters(3000.0), 3).unwrap());
    let ghost = GhostLap::from_lap(&lap_from(0, 0.0, |d| d / 50.0)).unwrap();
    CoachSession::new("e2e", track, ghost, &CoachConfig::default()).unwrap()
}

#[test]
fn test_time_lost_in_one_sector_is_isolated() {
    let mut session = three_sector_session();
    let live = lap_from(1, 500.0, slow_in_middle);

    let mut closed = Vec::new();
    for sample in &live.samples {
        let update = session.process(sample).unwrap();
        closed.extend(update.closed);
    }
    assert_eq!(closed.len(), 2);

    let report = match session.handle(&SourceEvent::EndOfLap).unwrap() {
        SessionOutput::LapComplete(report) => report,
        other => panic!("expected lap report, got {:?}", other),
    };

    let deltas: Vec<f64> = report.sectors.iter().map(|r| r.delta.0).collect();
    assert_eq!(deltas.len(), 3);
    assert!(deltas[0].abs() < 1e-6, "sector 1: {}", deltas[0]);
    assert!((deltas[1] - 2.0).abs() < 1e-6, "sector 2: {}", deltas[1]);
    assert!(deltas[2].abs() < 1e-6, "sector 3: {}", deltas[2]);

    assert!((report.sectors[2].cumulative_delta.0 - 2.0).abs() < 1e-6);
    assert!((report.live_lap_time.0 - 62.0).abs() < 1e-6);
    assert!((report.final_delta.unwrap().0 - 2.0).abs() < 1e-6);
}

#[test]
fn test_projection_settles_on_final_time() {
    let mut session = three_sector_session();
    let live = lap_from(1, 0.0, slow_in_middle);

    let mut last = None;
    for sample in &live.samples {
        last = session.process(sample).unwrap().projected_lap_time;
    }
    let projected = last.unwrap().0;
    assert!((projected - 62.0).abs() < 0.5, "projected {}", projected);
}

#[test]
fn test_out_of_order_sample_is_dropped() {
    let mut session = three_sector_session();
    let live = lap_from(1, 0.0, |d| d / 50.0);

    for sample in &live.samples[..300] {
        session.process(sample).unwrap();
    }
    let stale = live.samples[250].clone();
    assert!(session.handle(&SourceEvent::Sample(stale)).is_err());
    assert_eq!(session.dropped(), 1);

    for sample in &live.samples[300..] {
        session.process(sample).unwrap();
    }
    let report = session.end_lap().unwrap();
    assert_eq!(report.sectors.len(), 3);
    assert!(report.sectors.iter().all(|r| r.delta.0.abs() < 1e-9));
}

#[test]
fn test_ghost_survives_cache_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ghost.json");

    let ghost = GhostLap::from_lap(&lap_from(0, 0.0, |d| d / 50.0)).unwrap();
    ghost.save(&path).unwrap();
    let loaded = GhostLap::load(&path).unwrap();

    let track = Arc::new(TrackGeometry::even("Test Circuit", ghost_core::units::Meters(3000.0), 3).unwrap());
    let mut session = CoachSession::new("cached", track, loaded, &CoachConfig::default()).unwrap();
    let update = session.process(&TelemetrySample::at(0.0, 0.0, 50.0)).unwrap();
    assert_eq!(update.delta.map(|d| d.0), Some(0.0));
}
