use image::RgbImage;
use shared::{ContextFinding, FindingStatus};

use crate::models::Captioner;

/// Caption vocabulary hinting that the captioning model saw an incoherent scene.
pub const SUSPICIOUS_TERMS: [&str; 4] = ["glitch", "abstract", "distorted", "blur"];

pub const SUSPICIOUS_IMPACT: f32 = 0.2;

pub fn evaluate_caption(caption: String) -> ContextFinding {
    let lowered = caption.to_lowercase();
    if SUSPICIOUS_TERMS.iter().any(|term| lowered.contains(term)) {
        return ContextFinding {
            status: FindingStatus::Warning,
            message: format!(
                "Caption contains suspicious terms indicating low coherence: {}",
                caption
            ),
            caption: Some(caption),
            impact: Some(SUSPICIOUS_IMPACT),
        };
    }
    ContextFinding {
        status: FindingStatus::Success,
        message: "Caption seems semantically sound.".to_string(),
        caption: Some(caption),
        impact: Some(0.0),
    }
}

pub fn check_context(captioner: Option<&dyn Captioner>, image: &RgbImage) -> ContextFinding {
    let Some(captioner) = captioner else {
        return ContextFinding {
            status: FindingStatus::Error,
            caption: None,
            message: "Contextual model not loaded.".to_string(),
            impact: None,
        };
    };

    match captioner.caption(image) {
        Ok(caption) => evaluate_caption(caption),
        Err(e) => {
            log::warn!("Contextual check failed: {}", e);
            ContextFinding {
                status: FindingStatus::Error,
                caption: None,
                message: format!("Contextual check failed: {}", e),
                impact: None,
            }
        }
    }
}
