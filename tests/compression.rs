//! Compression Ladder Integration Tests
//!
//! Drives `MediaIngestor::compress` with a scripted encoder to check profile
//! order, caching, ceiling enforcement and cleanup.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use professor::adapters::{Encoder, EncodingProfile, ToolError};
use professor::ingest::{default_profiles, MediaError, MediaIngestor, ValidationError};
use tempfile::TempDir;

const CEILING: u64 = 1_000;

/// What the fake encoder does for one profile
#[derive(Clone, Copy)]
enum Outcome {
    /// Write a file of this many bytes
    Write(usize),
    /// Write a partial file, then exit non-zero
    Crash,
}

struct ScriptedEncoder {
    installed: bool,
    script: Vec<(&'static str, Outcome)>,
    calls: Mutex<Vec<EncodingProfile>>,
}

impl ScriptedEncoder {
    fn new(script: Vec<(&'static str, Outcome)>) -> Self {
        Self {
            installed: true,
            script,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn missing() -> Self {
        Self {
            installed: false,
            ..Self::new(Vec::new())
        }
    }

    fn bitrates_tried(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.bitrate.clone())
            .collect()
    }
}

#[async_trait]
impl Encoder for ScriptedEncoder {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn ensure_available(&self) -> Result<(), ToolError> {
        if self.installed {
            Ok(())
        } else {
            Err(ToolError::NotInstalled {
                tool: "scripted".to_string(),
            })
        }
    }

    async fn encode(
        &self,
        _input: &Path,
        output: &Path,
        profile: &EncodingProfile,
    ) -> Result<(), ToolError> {
        self.calls.lock().unwrap().push(profile.clone());

        let outcome = self
            .script
            .iter()
            .find(|(bitrate, _)| *bitrate == profile.bitrate)
            .map(|(_, outcome)| *outcome)
            .unwrap_or(Outcome::Write(CEILING as usize * 10));

        match outcome {
            Outcome::Write(len) => {
                std::fs::write(output, vec![0u8; len]).unwrap();
                Ok(())
            }
            Outcome::Crash => {
                std::fs::write(output, b"partial").unwrap();
                Err(ToolError::Failed {
                    tool: "scripted".to_string(),
                    code: 1,
                    stderr: format!("cannot encode at {}", profile),
                })
            }
        }
    }
}

async fn create_test_ingestor(encoder: Arc<ScriptedEncoder>) -> (MediaIngestor, PathBuf, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let ingestor = MediaIngestor::open(temp_dir.path(), 0)
        .await
        .unwrap()
        .with_encoder(encoder)
        .with_ceiling(CEILING);
    let input = ingestor.audio_dir().join("lecture.m4a");
    std::fs::write(&input, b"raw audio").unwrap();
    (ingestor, input, temp_dir)
}

#[tokio::test]
async fn test_stops_at_first_profile_that_fits() {
    let encoder = Arc::new(ScriptedEncoder::new(vec![
        ("128k", Outcome::Write(5_000)),
        ("96k", Outcome::Write(2_000)),
        ("64k", Outcome::Write(900)),
        ("48k", Outcome::Write(500)),
    ]));
    let (ingestor, input, _temp) = create_test_ingestor(encoder.clone()).await;

    let output = ingestor.compress(&input).await.unwrap();

    assert_eq!(output, ingestor.audio_dir().join("lecture_compressed.mp3"));
    assert_eq!(std::fs::metadata(&output).unwrap().len(), 900);
    assert_eq!(encoder.bitrates_tried(), vec!["128k", "96k", "64k"]);
}

#[tokio::test]
async fn test_profiles_are_tried_in_ladder_order() {
    let encoder = Arc::new(ScriptedEncoder::new(Vec::new()));
    let (ingestor, input, _temp) = create_test_ingestor(encoder.clone()).await;

    let _ = ingestor.compress(&input).await;

    let tried: Vec<EncodingProfile> = encoder.calls.lock().unwrap().clone();
    assert_eq!(tried, default_profiles());
}

#[tokio::test]
async fn test_existing_output_is_reused() {
    let encoder = Arc::new(ScriptedEncoder::new(vec![("128k", Outcome::Write(800))]));
    let (ingestor, input, _temp) = create_test_ingestor(encoder.clone()).await;

    let first = ingestor.compress(&input).await.unwrap();
    let second = ingestor.compress(&input).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(encoder.bitrates_tried(), vec!["128k"]);
}

#[tokio::test]
async fn test_cached_output_skips_availability_check() {
    let encoder = Arc::new(ScriptedEncoder::missing());
    let (ingestor, input, _temp) = create_test_ingestor(encoder.clone()).await;

    let cached = ingestor.compressed_path_for(&input);
    std::fs::write(&cached, vec![0u8; 10]).unwrap();

    assert_eq!(ingestor.compress(&input).await.unwrap(), cached);
    assert!(encoder.bitrates_tried().is_empty());
}

#[tokio::test]
async fn test_oversized_cached_output_is_regenerated() {
    let encoder = Arc::new(ScriptedEncoder::new(vec![("128k", Outcome::Write(700))]));
    let (ingestor, input, _temp) = create_test_ingestor(encoder.clone()).await;

    let cached = ingestor.compressed_path_for(&input);
    std::fs::write(&cached, vec![0u8; CEILING as usize + 1]).unwrap();

    let output = ingestor.compress(&input).await.unwrap();
    assert_eq!(std::fs::metadata(&output).unwrap().len(), 700);
    assert_eq!(encoder.bitrates_tried(), vec!["128k"]);
}

#[tokio::test]
async fn test_missing_tool_fails_before_any_profile() {
    let encoder = Arc::new(ScriptedEncoder::missing());
    let (ingestor, input, _temp) = create_test_ingestor(encoder.clone()).await;

    let err = ingestor.compress(&input).await.unwrap_err();

    assert!(matches!(err, MediaError::Tool(ToolError::NotInstalled { .. })));
    assert!(encoder.bitrates_tried().is_empty());
}

#[tokio::test]
async fn test_every_profile_too_large() {
    let encoder = Arc::new(ScriptedEncoder::new(Vec::new()));
    let (ingestor, input, _temp) = create_test_ingestor(encoder.clone()).await;

    let err = ingestor.compress(&input).await.unwrap_err();

    assert!(matches!(
        err,
        MediaError::Validation(ValidationError::ExceedsCeiling { limit: CEILING, .. })
    ));
    assert_eq!(encoder.bitrates_tried().len(), 5);
    assert!(!ingestor.compressed_path_for(&input).exists());
}

#[tokio::test]
async fn test_last_error_wins_and_partials_are_removed() {
    let encoder = Arc::new(ScriptedEncoder::new(vec![
        ("128k", Outcome::Write(5_000)),
        ("96k", Outcome::Crash),
        ("64k", Outcome::Crash),
        ("48k", Outcome::Crash),
        ("32k", Outcome::Crash),
    ]));
    let (ingestor, input, _temp) = create_test_ingestor(encoder.clone()).await;

    let err = ingestor.compress(&input).await.unwrap_err();

    match err {
        MediaError::Tool(ToolError::Failed { code, stderr, .. }) => {
            assert_eq!(code, 1);
            assert!(stderr.contains("32k"));
        }
        other => panic!("expected tool failure, got {other:?}"),
    }
    assert!(!ingestor.compressed_path_for(&input).exists());
}

#[tokio::test]
async fn test_recovers_after_a_crashing_profile() {
    let encoder = Arc::new(ScriptedEncoder::new(vec![
        ("128k", Outcome::Crash),
        ("96k", Outcome::Write(1_000)),
    ]));
    let (ingestor, input, _temp) = create_test_ingestor(encoder.clone()).await;

    // Exactly at the ceiling is accepted
    let output = ingestor.compress(&input).await.unwrap();
    assert_eq!(std::fs::metadata(&output).unwrap().len(), CEILING);
    assert_eq!(encoder.bitrates_tried(), vec!["128k", "96k"]);
}

#[tokio::test]
async fn test_empty_ladder() {
    let encoder = Arc::new(ScriptedEncoder::new(Vec::new()));
    let (ingestor, input, _temp) = create_test_ingestor(encoder).await;
    let ingestor = ingestor.with_profiles(Vec::new());

    let err = ingestor.compress(&input).await.unwrap_err();
    assert!(matches!(
        err,
        MediaError::Validation(ValidationError::NoProfiles)
    ));
}
