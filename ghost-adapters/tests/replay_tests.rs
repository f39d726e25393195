//! Integration tests for the ReplaySource

use ghost_adapters::replay::write_recording;
use ghost_adapters::{DemoConfig, DemoSource, ReplaySource};
use ghost_core::source::TelemetrySource;
use ghost_core::SourceEvent;
use std::io::Cursor;

fn drain(source: &mut ReplaySource) -> Vec<SourceEvent> {
    let mut events = Vec::new();
    while let Some(event) = source.next_event().unwrap() {
        events.push(event);
    }
    events
}

#[test]
fn test_recording_replays_laps_in_order() {
    let demo = DemoSource::new(DemoConfig::default()).unwrap();
    let laps = vec![demo.generate_lap(0, 0.0), demo.generate_lap(1, 100.0)];

    let mut buf = Vec::new();
    write_recording(&mut buf, &laps).unwrap();

    let mut replay = ReplaySource::from_reader("memory", Cursor::new(buf));
    replay.start().unwrap();
    let events = drain(&mut replay);

    let expected = laps[0].samples.len() + laps[1].samples.len() + 2;
    assert_eq!(events.len(), expected);
    assert!(matches!(events[laps[0].samples.len()], SourceEvent::EndOfLap));
    assert!(matches!(events.last(), Some(SourceEvent::EndOfLap)));
    assert!(!replay.is_active());
}

#[test]
fn test_blank_lines_are_skipped() {
    let text = "\n{\"type\":\"end_of_lap\"}\n\n{\"type\":\"end_of_lap\"}\n";
    let mut replay = ReplaySource::from_reader("memory", Cursor::new(text.as_bytes().to_vec()));
    replay.start().unwrap();
    assert_eq!(drain(&mut replay).len(), 2);
    assert_eq!(replay.line(), 4);
}

#[test]
fn test_bad_line_reports_line_number() {
    let text = "{\"type\":\"end_of_lap\"}\nnot json\n";
    let mut replay = ReplaySource::from_reader("memory", Cursor::new(text.as_bytes().to_vec()));
    replay.start().unwrap();
    assert!(replay.next_event().unwrap().is_some());

    let err = replay.next_event().unwrap_err();
    assert!(format!("{:#}", err).contains("line 2"), "{:#}", err);
}

#[test]
fn test_file_replay() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.ndjson");

    let demo = DemoSource::new(DemoConfig::default()).unwrap();
    let mut file = std::fs::File::create(&path).unwrap();
    write_recording(&mut file, &[demo.generate_lap(0, 0.0)]).unwrap();
    drop(file);

    let mut replay = ReplaySource::open(&path);
    assert_eq!(replay.name(), "session.ndjson");
    assert!(replay.next_event().unwrap().is_none(), "inactive before start()");
    replay.start().unwrap();
    assert!(matches!(replay.next_event().unwrap(), Some(SourceEvent::Sample(_))));
}

#[test]
fn test_missing_file_fails_on_start() {
    let mut replay = ReplaySource::open(std::path::Path::new("/nonexistent/recording.ndjson"));
    assert!(replay.start().is_err());
}
