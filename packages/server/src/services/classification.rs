//! Best-effort time extraction from proof images.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::ClassificationResult;
use common::event::SubmissionClassified;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, instrument, warn};

use super::notify::Notifier;
use crate::config::SubmissionConfig;
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("failed to run recognizer: {0}")]
    Spawn(String),
    #[error("recognizer exited with failure: {0}")]
    Failed(String),
}

/// External optical text recognition.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Raw text found in the image.
    async fn recognize(&self, image: &Path) -> Result<String, RecognitionError>;
}

/// Runs the `tesseract` CLI and reads the text from stdout.
pub struct TesseractRecognizer {
    bin: String,
    lang: String,
}

impl TesseractRecognizer {
    pub fn new(bin: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            lang: lang.into(),
        }
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    async fn recognize(&self, image: &Path) -> Result<String, RecognitionError> {
        // `kill_on_drop` ends the child when the caller's timeout drops this future.
        let output = Command::new(&self.bin)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.lang)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| RecognitionError::Spawn(format!("{}: {err}", self.bin)))?;

        if !output.status.success() {
            return Err(RecognitionError::Failed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Wraps a recognizer with a timeout and maps every failure to an
/// unprocessed result.
#[derive(Clone)]
pub struct Classifier {
    recognizer: Arc<dyn TextRecognizer>,
    timeout: Duration,
}

impl Classifier {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, timeout: Duration) -> Self {
        Self {
            recognizer,
            timeout,
        }
    }

    pub fn from_config(config: &SubmissionConfig) -> Self {
        Self::new(
            Arc::new(TesseractRecognizer::new(
                &config.tesseract_bin,
                &config.tesseract_lang,
            )),
            Duration::from_millis(config.classification_timeout_ms),
        )
    }

    /// Never fails; errors and timeouts yield [`ClassificationResult::unprocessed`].
    #[instrument(skip(self, image), fields(image = %image.display()))]
    pub async fn classify(&self, image: &Path, declared_ms: u64) -> ClassificationResult {
        match tokio::time::timeout(self.timeout, self.recognizer.recognize(image)).await {
            Ok(Ok(text)) => ClassificationResult::from_recognized_text(&text, declared_ms),
            Ok(Err(e)) => {
                warn!(error = %e, "Text recognition failed");
                ClassificationResult::unprocessed()
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Text recognition timed out");
                ClassificationResult::unprocessed()
            }
        }
    }
}

/// What a background classification run annotates.
pub struct PendingClassification {
    pub event_id: i32,
    pub submission_id: i32,
    pub image: PathBuf,
    pub declared_ms: u64,
}

/// Classify after the submission already exists, then attach the result.
///
/// The task holds no lock or transaction while recognition runs.
pub fn spawn_annotation(
    classifier: Classifier,
    store: Arc<dyn Store>,
    notifier: Notifier,
    job: PendingClassification,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let result = classifier.classify(&job.image, job.declared_ms).await;

        match store.set_classification(job.submission_id, result.clone()).await {
            Ok(_) => {
                info!(
                    submission_id = job.submission_id,
                    confidence = result.confidence,
                    was_processed = result.was_processed,
                    "Classification attached"
                );
                notifier
                    .emit(&SubmissionClassified {
                        event_id: job.event_id,
                        submission_id: job.submission_id,
                        classification: result,
                    })
                    .await;
            }
            Err(StoreError::NotPending(status)) => {
                info!(
                    submission_id = job.submission_id,
                    %status,
                    "Submission reviewed before classification finished, result dropped"
                );
            }
            Err(e) => {
                // Withdrawn while recognition was running.
                warn!(error = %e, submission_id = job.submission_id, "Failed to attach classification");
            }
        }
    })
}
