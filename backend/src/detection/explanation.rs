use rand::Rng;
use rand::seq::IndexedRandom;

pub const HIGH_AUTHENTICITY: &str =
    "High confidence in authenticity. Noise patterns are consistent with natural sensor variation, and no generative artifacts were detected in the frequency domain.";

pub const LIKELY_AUTHENTIC: &str =
    "Likely authentic, though some minor compression artifacts were noted. These are typical of social media re-compression and do not indicate manipulation.";

pub const SUSPICIOUS_PREFIX: &str = "Suspicious patterns detected.";
pub const SUSPICIOUS_SUFFIX: &str =
    "The noise geometry deviates from standard camera fingerprints.";
pub const SUSPICIOUS_REASONS: [&str; 4] = [
    "Inconsistent lighting direction on the subject's face compared to the background.",
    "Subtle warping artifacts detected around the mouth and eyes.",
    "Frequency analysis shows peaks consistent with GAN-based upsampling.",
    "Hair strands exhibit 'mushy' textures typical of generative models.",
];

pub const CRITICAL_PREFIX: &str = "Critical anomalies detected.";
pub const CRITICAL_SUFFIX: &str =
    "The image lacks the photonic noise signature of a real camera sensor.";
pub const CRITICAL_REASONS: [&str; 4] = [
    "Strong generative artifacts found in the high-frequency spectrum.",
    "Eyes lack natural corneal reflection consistency.",
    "Background blurring does not match the depth-of-field of the foreground subject.",
    "Facial landmarks show micro-tremors inconsistent with biological movement.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    HighAuthenticity,
    LikelyAuthentic,
    Suspicious,
    Critical,
}

impl Band {
    /// The 0.5 boundary sits on the authentic side, matching the label threshold.
    pub fn for_score(score: f32) -> Self {
        if score < 0.20 {
            Band::HighAuthenticity
        } else if score <= 0.50 {
            Band::LikelyAuthentic
        } else if score < 0.80 {
            Band::Suspicious
        } else {
            Band::Critical
        }
    }
}

pub fn explain<R: Rng + ?Sized>(score: f32, rng: &mut R) -> String {
    match Band::for_score(score) {
        Band::HighAuthenticity => HIGH_AUTHENTICITY.to_string(),
        Band::LikelyAuthentic => LIKELY_AUTHENTIC.to_string(),
        Band::Suspicious => {
            let reason = SUSPICIOUS_REASONS.choose(rng).copied().unwrap_or_default();
            format!("{} {} {}", SUSPICIOUS_PREFIX, reason, SUSPICIOUS_SUFFIX)
        }
        Band::Critical => {
            let reason = CRITICAL_REASONS.choose(rng).copied().unwrap_or_default();
            format!("{} {} {}", CRITICAL_PREFIX, reason, CRITICAL_SUFFIX)
        }
    }
}
