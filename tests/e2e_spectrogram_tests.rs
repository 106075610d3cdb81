//! End-to-end tests for the segmentation and spectrogram phase.
//!
//! Covers the full hash -> render -> persist -> delete path, content-hash
//! deduplication, resumability from leftover segment files, and per-segment
//! failure isolation.

mod common;

use common::{MockRenderer, TestProject};
use neuralforge::renderer::AudibleInterval;
use neuralforge::store::{hash_bytes, ContentStore, SPECTROGRAM_SIZE};
use std::path::Path;
use std::sync::Arc;

const A_BYTES: &[u8] = b"wav bytes of a";

async fn normalized_project(names_and_bytes: &[(&str, &[u8])]) -> TestProject {
    let project = TestProject::create().await;
    let mut names = Vec::new();
    for (name, bytes) in names_and_bytes {
        project.write_source(name, bytes).await;
        names.push(*name);
    }
    project.write_inventory(&[(".", &names)]).await;
    project
        .manager(Arc::new(MockRenderer::new()))
        .convert_files_to_wav()
        .await
        .unwrap();
    project
}

#[tokio::test]
async fn test_single_wav_produces_one_record() {
    let project = normalized_project(&[("a.wav", A_BYTES)]).await;
    let renderer = Arc::new(MockRenderer::new());
    let manager = project.manager(renderer.clone());

    let hashes = manager.process_audio_chunks_and_spectrograms().await.unwrap();

    // No silence detected, so the whole file is the one segment.
    let expected_hash = hash_bytes(A_BYTES);
    assert_eq!(hashes, vec![expected_hash.clone()]);
    assert_eq!(renderer.render_count(), 1);

    let records = project.record_files().await;
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0],
        project
            .paths
            .spectrograms_dir
            .join(format!("{}.json", expected_hash))
    );

    let record = ContentStore::load(&records[0]).await.unwrap();
    assert_eq!(record.file_name, "a_chunk1.wav");
    assert_eq!(record.md5_hash, expected_hash);
    assert_eq!(record.spectrogram.len(), SPECTROGRAM_SIZE);
    assert_eq!(record.spectrogram[0].len(), SPECTROGRAM_SIZE);
    for value in &record.spectrogram[0] {
        assert!((0.0..=1.0).contains(value));
    }

    // The segment was deleted after persistence; its recorded path dangles.
    assert!(record.chunk_path.ends_with("a_chunk1.wav"));
    assert!(!Path::new(&record.chunk_path).exists());
    assert!(project.leftover_wavs().await.is_empty());
    assert!(project.log_lines().await.is_empty());
}

#[tokio::test]
async fn test_silence_intervals_become_separate_records() {
    let project = normalized_project(&[("a.wav", A_BYTES)]).await;
    let renderer = Arc::new(MockRenderer::new().with_silence(
        "a.wav",
        vec![
            AudibleInterval {
                start: 0.0,
                end: Some(1.5),
            },
            AudibleInterval {
                start: 4.0,
                end: None,
            },
        ],
    ));
    let manager = project.manager(renderer.clone());

    let hashes = manager.process_audio_chunks_and_spectrograms().await.unwrap();

    assert_eq!(hashes.len(), 2);
    assert_eq!(renderer.render_count(), 2);
    assert_eq!(project.record_files().await.len(), 2);
    assert!(project.leftover_wavs().await.is_empty());
}

#[tokio::test]
async fn test_equal_content_segments_are_deduplicated() {
    let project = normalized_project(&[("a.wav", A_BYTES)]).await;
    // Two intervals of equal duration extract to identical bytes in the mock,
    // so they share one content hash.
    let renderer = Arc::new(MockRenderer::new().with_silence(
        "a.wav",
        vec![
            AudibleInterval {
                start: 0.0,
                end: Some(1.0),
            },
            AudibleInterval {
                start: 5.0,
                end: Some(6.0),
            },
        ],
    ));
    let manager = project.serial_manager(renderer.clone());

    let hashes = manager.process_audio_chunks_and_spectrograms().await.unwrap();

    assert_eq!(hashes.len(), 2);
    assert_eq!(hashes[0], hashes[1]);
    assert_eq!(renderer.render_count(), 1);
    assert_eq!(project.record_files().await.len(), 1);
    assert!(project.leftover_wavs().await.is_empty());
}

#[tokio::test]
async fn test_rerun_renders_nothing_new() {
    let project = normalized_project(&[("a.wav", A_BYTES)]).await;

    let first = Arc::new(MockRenderer::new());
    project
        .manager(first.clone())
        .process_audio_chunks_and_spectrograms()
        .await
        .unwrap();
    assert_eq!(first.render_count(), 1);
    let records_before = project.record_files().await;

    // Second run re-segments the same WAV; the store gate catches every
    // chunk, so no spectrogram is rendered again.
    let second = Arc::new(MockRenderer::new());
    let hashes = project
        .manager(second.clone())
        .process_audio_chunks_and_spectrograms()
        .await
        .unwrap();

    assert_eq!(second.render_count(), 0);
    assert_eq!(hashes, vec![hash_bytes(A_BYTES)]);
    assert_eq!(project.record_files().await, records_before);
    assert!(project.leftover_wavs().await.is_empty());
}

#[tokio::test]
async fn test_leftover_segment_is_swept_on_resume() {
    let project = TestProject::create().await;
    tokio::fs::create_dir_all(&project.paths.sounds_dir)
        .await
        .unwrap();
    tokio::fs::create_dir_all(&project.paths.spectrograms_dir)
        .await
        .unwrap();

    // A segment left behind by an interrupted run.
    let stray = project.paths.spectrograms_dir.join("old_chunk3.wav");
    tokio::fs::write(&stray, b"orphaned segment bytes")
        .await
        .unwrap();

    let renderer = Arc::new(MockRenderer::new());
    let hashes = project
        .manager(renderer.clone())
        .process_audio_chunks_and_spectrograms()
        .await
        .unwrap();

    assert_eq!(hashes, vec![hash_bytes(b"orphaned segment bytes")]);
    assert_eq!(renderer.render_count(), 1);
    assert!(!stray.exists());
    assert_eq!(project.record_files().await.len(), 1);
}

#[tokio::test]
async fn test_leftover_on_a_reused_chunk_path_drains_before_resegmentation() {
    let project = normalized_project(&[("a.wav", A_BYTES)]).await;
    tokio::fs::create_dir_all(&project.paths.spectrograms_dir)
        .await
        .unwrap();

    // An interrupted run left a chunk on the exact path the next
    // segmentation of a.wav writes again. It must be hashed and recorded
    // in full before that path is overwritten.
    let stale = project.paths.spectrograms_dir.join("a_chunk1.wav");
    tokio::fs::write(&stale, b"stale interrupted bytes")
        .await
        .unwrap();

    let renderer = Arc::new(MockRenderer::new());
    let hashes = project
        .manager(renderer.clone())
        .process_audio_chunks_and_spectrograms()
        .await
        .unwrap();

    assert_eq!(
        hashes,
        vec![hash_bytes(b"stale interrupted bytes"), hash_bytes(A_BYTES)]
    );
    assert_eq!(renderer.render_count(), 2);
    assert_eq!(project.record_files().await.len(), 2);
    assert!(project.leftover_wavs().await.is_empty());
    assert!(project.log_lines().await.is_empty());
}

#[tokio::test]
async fn test_render_failure_skips_segment_and_continues() {
    let project = normalized_project(&[
        ("a.wav", A_BYTES),
        ("b.wav", b"wav bytes of b"),
        ("c.wav", b"wav bytes of c"),
    ])
    .await;
    let renderer = Arc::new(MockRenderer::new().failing_render_on("b_chunk"));
    let manager = project.manager(renderer.clone());

    let mut hashes = manager.process_audio_chunks_and_spectrograms().await.unwrap();

    hashes.sort();
    let mut expected = vec![hash_bytes(A_BYTES), hash_bytes(b"wav bytes of c")];
    expected.sort();
    assert_eq!(hashes, expected);
    assert_eq!(project.record_files().await.len(), 2);

    // The failed segment stays in place for a later run to pick up.
    assert_eq!(
        project.leftover_wavs().await,
        vec![project.paths.spectrograms_dir.join("b_chunk1.wav")]
    );

    let lines = project.log_lines().await;
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("b_chunk1.wav"));
}

#[tokio::test]
async fn test_wrong_size_spectrogram_is_rejected() {
    let project = normalized_project(&[("a.wav", A_BYTES)]).await;
    let renderer = Arc::new(MockRenderer::new().with_image_size(64));
    let manager = project.manager(renderer.clone());

    let hashes = manager.process_audio_chunks_and_spectrograms().await.unwrap();

    assert!(hashes.is_empty());
    assert!(project.record_files().await.is_empty());
    // The segment survives the failed attempt.
    assert_eq!(project.leftover_wavs().await.len(), 1);

    let lines = project.log_lines().await;
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("a_chunk1.wav"));
}
