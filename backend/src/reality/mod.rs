pub mod context;
pub mod metadata;

use shared::{ContextFinding, FindingStatus, MetadataFinding, RealityResult};
use std::path::Path;
use std::sync::Arc;

use crate::models::Captioner;

const METADATA_WARNING_PENALTY: f32 = 0.1;
const METADATA_DANGER_PENALTY: f32 = 0.5;

/// Folds both findings into a trust score in `[0, 1]`, 1.0 being most authentic.
pub fn reality_score(metadata: &MetadataFinding, context: &ContextFinding) -> f32 {
    let mut score = 1.0f32;
    match metadata.status {
        FindingStatus::Warning => score -= METADATA_WARNING_PENALTY,
        FindingStatus::Danger => score -= METADATA_DANGER_PENALTY,
        FindingStatus::Success | FindingStatus::Error => {}
    }
    if context.status == FindingStatus::Warning {
        score -= context.impact.unwrap_or(0.0).max(0.0);
    }
    score.max(0.0)
}

#[derive(Clone, Default)]
pub struct RealityAssessor {
    captioner: Option<Arc<dyn Captioner>>,
}

impl RealityAssessor {
    pub fn new(captioner: Option<Arc<dyn Captioner>>) -> Self {
        Self { captioner }
    }

    pub fn has_captioner(&self) -> bool {
        self.captioner.is_some()
    }

    pub fn assess(&self, image_path: &Path) -> RealityResult {
        match std::fs::read(image_path) {
            Ok(bytes) => self.assess_bytes(&bytes),
            Err(e) => {
                log::warn!("Reality check could not read {}: {}", image_path.display(), e);
                let metadata = MetadataFinding {
                    status: FindingStatus::Error,
                    message: format!("Metadata analysis failed: {}", e),
                    raw_fields: None,
                };
                let context = ContextFinding {
                    status: FindingStatus::Error,
                    caption: None,
                    message: format!("Contextual check failed: {}", e),
                    impact: None,
                };
                RealityResult {
                    reality_score: reality_score(&metadata, &context),
                    metadata,
                    context,
                }
            }
        }
    }

    pub fn assess_bytes(&self, bytes: &[u8]) -> RealityResult {
        let metadata = metadata::check_metadata(bytes);
        let context = match image::load_from_memory(bytes) {
            Ok(image) => context::check_context(self.captioner.as_deref(), &image.to_rgb8()),
            Err(e) => ContextFinding {
                status: FindingStatus::Error,
                caption: None,
                message: format!("Contextual check failed: {}", e),
                impact: None,
            },
        };
        let reality_score = reality_score(&metadata, &context);
        RealityResult {
            reality_score,
            metadata,
            context,
        }
    }
}
