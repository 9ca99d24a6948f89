use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::FeedbackSubmission;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
    #[serde(flatten)]
    pub submission: FeedbackSubmission,
}

impl FeedbackRecord {
    pub fn new(submission: FeedbackSubmission) -> Self {
        Self {
            id: Uuid::new_v4(),
            received_at: Utc::now(),
            submission,
        }
    }
}
