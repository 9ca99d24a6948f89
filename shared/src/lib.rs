use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::{Display, EnumString};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum DetectionLabel {
    #[serde(rename = "AI-Generated")]
    #[strum(serialize = "AI-Generated")]
    AiGenerated,
    #[serde(rename = "Real")]
    #[strum(serialize = "Real")]
    Real,
    #[serde(rename = "Error")]
    #[strum(serialize = "Error")]
    Error,
    #[serde(rename = "Model-Error")]
    #[strum(serialize = "Model-Error")]
    ModelError,
}

impl DetectionLabel {
    /// Whether the label carries a usable score rather than a neutral fallback.
    pub fn is_scored(&self) -> bool {
        matches!(self, DetectionLabel::AiGenerated | DetectionLabel::Real)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FindingStatus {
    Success,
    Warning,
    Danger,
    Error,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MetadataFinding {
    pub status: FindingStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_fields: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ContextFinding {
    pub status: FindingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RealityResult {
    pub reality_score: f32,
    pub metadata: MetadataFinding,
    pub context: ContextFinding,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum RealityCheck {
    Assessed(RealityResult),
    Skipped { reality_score: f32, message: String },
}

impl RealityCheck {
    pub fn reality_score(&self) -> f32 {
        match self {
            RealityCheck::Assessed(result) => result.reality_score,
            RealityCheck::Skipped { reality_score, .. } => *reality_score,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DetectionResult {
    pub ai_likelihood: f32,
    pub label: DetectionLabel,
    pub explanation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reality_check: Option<RealityCheck>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Display)]
pub enum VideoLabel {
    #[serde(rename = "FAKE")]
    #[strum(serialize = "FAKE")]
    Fake,
    #[serde(rename = "REAL")]
    #[strum(serialize = "REAL")]
    Real,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VideoResult {
    pub label: VideoLabel,
    pub average_score: f32,
    pub frame_count: usize,
    pub fake_frame_count: usize,
    pub summary: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Real,
    Fake,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FeedbackSubmission {
    pub file_id: String,
    pub user_verdict: Verdict,
    #[serde(default)]
    pub comments: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_score: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn labels_use_hyphenated_wire_names() {
        let json = serde_json::to_string(&DetectionLabel::ModelError).unwrap();
        assert_eq!(json, "\"Model-Error\"");
        assert_eq!(DetectionLabel::AiGenerated.to_string(), "AI-Generated");
        assert_eq!(
            DetectionLabel::from_str("Real").unwrap(),
            DetectionLabel::Real
        );
        assert_eq!(serde_json::to_string(&VideoLabel::Fake).unwrap(), "\"FAKE\"");
    }

    #[test]
    fn skipped_reality_check_serializes_flat() {
        let check = RealityCheck::Skipped {
            reality_score: 0.5,
            message: "skipped".into(),
        };
        let value = serde_json::to_value(&check).unwrap();
        assert_eq!(value["reality_score"], 0.5);
        assert_eq!(value["message"], "skipped");
        assert_eq!(check.reality_score(), 0.5);
    }

    #[test]
    fn only_classified_labels_are_scored() {
        assert!(DetectionLabel::AiGenerated.is_scored());
        assert!(DetectionLabel::Real.is_scored());
        assert!(!DetectionLabel::Error.is_scored());
        assert!(!DetectionLabel::ModelError.is_scored());
    }
}
