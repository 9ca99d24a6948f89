use shared::FeedbackSubmission;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::models::FeedbackRecord;

#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    #[error("Invalid feedback: {0}")]
    Invalid(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Appends user disputes of a verdict to a JSON-lines file.
pub struct FeedbackService {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FeedbackService {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    fn validate(submission: &FeedbackSubmission) -> Result<(), FeedbackError> {
        if submission.file_id.trim().is_empty() {
            return Err(FeedbackError::Invalid("file_id is required".into()));
        }
        if let Some(score) = submission.ai_score {
            if !(0.0..=1.0).contains(&score) {
                return Err(FeedbackError::Invalid("ai_score must be within [0, 1]".into()));
            }
        }
        Ok(())
    }

    pub async fn record(
        &self,
        submission: FeedbackSubmission,
    ) -> Result<FeedbackRecord, FeedbackError> {
        Self::validate(&submission)?;
        let record = FeedbackRecord::new(submission);
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        log::info!(
            "Recorded feedback {} for {} ({:?})",
            record.id,
            record.submission.file_id,
            record.submission.user_verdict
        );
        Ok(record)
    }
}
