//! Failure semantics across the work cycle
//!
//! Malformed content fails only the segment being crafted; the chain parks
//! at the failed offset until an operator clears it, and the failed record
//! set still ships with an error-severity message. A missing audio byte
//! source fails the dub step the same way without corrupting the cache for
//! other keys.

mod helpers;

use helpers::{fixture, CollectingShipper, CollectingSink};
use std::sync::Arc;
use uuid::Uuid;
use weft_common::content::{ContentSnapshot, Program, ProgramType, Sequence, SequenceBinding};
use weft_common::meme::MemeStack;
use weft_common::segment::{MessageSeverity, SegmentState};
use weft_fab::cache::{AudioCache, LocalFileFetcher};
use weft_fab::config::FabConfig;
use weft_fab::work::{Advance, WorkCycle};

fn cycle_over(
    content: ContentSnapshot,
    audio_root: &std::path::Path,
    staging: &std::path::Path,
) -> (WorkCycle, Arc<CollectingSink>) {
    let mut config = FabConfig::default();
    config.cache.staging_dir = staging.to_path_buf();
    config.work.fallback_segment_seconds = 2.0;

    let cache = Arc::new(
        AudioCache::new(
            config.cache.max_bytes,
            config.output.frame_rate,
            staging.join("cache"),
            Arc::new(LocalFileFetcher::new(audio_root)),
        )
        .unwrap(),
    );
    let sink = Arc::new(CollectingSink::default());
    let cycle = WorkCycle::new(
        Uuid::new_v4(),
        config,
        Arc::new(content),
        Arc::new(MemeStack::new()),
        cache,
        Arc::clone(&sink) as Arc<dyn weft_fab::ship::SegmentSink>,
        Arc::new(CollectingShipper::default()) as Arc<dyn weft_fab::ship::AudioShipper>,
    );
    (cycle, sink)
}

/// A lone main program whose tag list cannot parse
fn malformed_content() -> ContentSnapshot {
    let program = Program {
        id: Uuid::new_v4(),
        name: "Broken".into(),
        program_type: ProgramType::Main,
        key: "C".into(),
        tempo: 120.0,
        density: 0.5,
        memes: vec!["two words".into()],
    };
    let sequence = Sequence {
        id: Uuid::new_v4(),
        program_id: program.id,
        name: "A".into(),
        total_beats: 8.0,
        key: None,
        chords: vec![],
    };
    let binding = SequenceBinding {
        id: Uuid::new_v4(),
        program_id: program.id,
        sequence_id: sequence.id,
        offset: 0,
        memes: vec![],
    };
    ContentSnapshot::new(vec![program], vec![sequence], vec![binding], vec![], vec![])
}

#[tokio::test(flavor = "multi_thread")]
async fn test_malformed_content_fails_segment_and_parks_chain() {
    let staging = tempfile::tempdir().unwrap();
    let audio = tempfile::tempdir().unwrap();
    let (cycle, sink) = cycle_over(malformed_content(), audio.path(), staging.path());

    assert_eq!(cycle.advance_once().await.unwrap(), Advance::Failed(0));
    assert_eq!(cycle.failed_offset().await, Some(0));

    // the failed record set still shipped, carrying the error
    {
        let shipped = sink.shipped.lock().unwrap();
        assert_eq!(shipped.len(), 1);
        assert_eq!(shipped[0].segment.state, SegmentState::Failed);
        assert!(shipped[0]
            .messages
            .iter()
            .any(|m| m.severity == MessageSeverity::Error));
    }

    // a parked chain does no work until the failure is cleared
    cycle.run_cycle(0).await.unwrap();
    assert_eq!(sink.shipped.lock().unwrap().len(), 1);

    // clearing re-attempts the same offset; the content is still broken
    cycle.clear_failed().await;
    assert_eq!(cycle.advance_once().await.unwrap(), Advance::Failed(0));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_audio_bytes_fail_the_dub_step() {
    let staging = tempfile::tempdir().unwrap();
    let audio_dir = tempfile::tempdir().unwrap();
    let fixture = fixture(audio_dir.path());

    // the crafts will still pick these audios; only the dub can discover
    // the bytes are gone
    std::fs::remove_file(audio_dir.path().join("kick.wav")).unwrap();
    std::fs::remove_file(audio_dir.path().join("snare.wav")).unwrap();

    let (cycle, sink) = cycle_over(fixture.content, audio_dir.path(), staging.path());

    assert_eq!(cycle.advance_once().await.unwrap(), Advance::Failed(0));

    let shipped = sink.shipped.lock().unwrap();
    assert_eq!(shipped.len(), 1);
    assert_eq!(shipped[0].segment.state, SegmentState::Failed);
    assert!(shipped[0]
        .messages
        .iter()
        .any(|m| m.body.contains("dub failed")));
    // the craft records survived; the segment failed in dubbing, not crafting
    assert!(!shipped[0].choices.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fresh_cycle_reports_healthy() {
    let staging = tempfile::tempdir().unwrap();
    let audio = tempfile::tempdir().unwrap();
    let (cycle, _sink) = cycle_over(malformed_content(), audio.path(), staging.path());
    assert!(cycle.healthy().await);
}
