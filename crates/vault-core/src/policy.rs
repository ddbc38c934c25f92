use crate::error::Result;
use crate::types::{Entity, ExposureCode, RetentionTier, Sensitivity};

/// Levels at or above this are secret and never given to any model.
pub const SECRET_LEVEL: u8 = 8;

/// Levels at or above this expose titles only.
pub const CONFIDENTIAL_LEVEL: u8 = 5;

/// Map (tier, sensitivity) to the exposure code gating automated processing.
///
/// First matching rule wins:
/// 1. no AI processing allowed at all: `Suppressed`
/// 2. secret level: `Suppressed`
/// 3. archived tier: `TitleOnly`
/// 4. confidential level: `TitleOnly`
/// 5. otherwise `Full`
///
/// Out-of-range sensitivity levels are rejected.
pub fn compute_exposure_code(tier: RetentionTier, sensitivity: &Sensitivity) -> Result<ExposureCode> {
    sensitivity.validate()?;

    let privacy = &sensitivity.privacy;
    if !privacy.remote_ai_allowed && !privacy.local_ai_allowed {
        return Ok(ExposureCode::Suppressed);
    }

    if sensitivity.level >= SECRET_LEVEL {
        return Ok(ExposureCode::Suppressed);
    }

    if tier == RetentionTier::Archived || sensitivity.level >= CONFIDENTIAL_LEVEL {
        return Ok(ExposureCode::TitleOnly);
    }

    Ok(ExposureCode::Full)
}

/// Text handed to the embedding provider for an entity, bounded to
/// `max_chars` characters. `None` when the entity must not be embedded
/// or has no visible text to embed.
pub fn embedding_text(entity: &Entity, max_chars: usize) -> Option<String> {
    let text = match entity.exposure() {
        ExposureCode::Suppressed => return None,
        ExposureCode::TitleOnly => entity.title.clone(),
        ExposureCode::Full if entity.content.is_empty() => entity.title.clone(),
        ExposureCode::Full => format!("{}\n{}", entity.title, entity.content),
    };
    let text = truncate_chars(&text, max_chars);
    if text.trim().is_empty() {
        return None;
    }
    Some(text.to_string())
}

/// Truncate to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
