use crate::error::{Result, VaultError};
use crate::policy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Type alias for entity identifiers. Supplied by the ingestion source.
pub type EntityId = String;

/// Type alias for relationship identifiers. UUIDv7, so id order is creation order.
pub type RelationshipId = Uuid;

/// Type alias for embedding vectors
pub type Embedding = Vec<f32>;

/// Highest accepted sensitivity level.
pub const MAX_SENSITIVITY_LEVEL: u8 = 9;

/// Lifecycle stage of an entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RetentionTier {
    /// Just captured. Nothing known about its value yet.
    Transitory,

    /// Survived first review.
    Temporary,

    /// Kept for the working horizon.
    ShortTerm,

    /// Kept indefinitely. Eligible for archival once stale.
    LongTerm,

    /// Stale long-term knowledge. Terminal for automatic evolution.
    Archived,

    /// Pinned by a human. Sticky: never promoted into or demoted out of.
    Canonical,
}

impl RetentionTier {
    pub const ALL: [RetentionTier; 6] = [
        RetentionTier::Transitory,
        RetentionTier::Temporary,
        RetentionTier::ShortTerm,
        RetentionTier::LongTerm,
        RetentionTier::Archived,
        RetentionTier::Canonical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RetentionTier::Transitory => "transitory",
            RetentionTier::Temporary => "temporary",
            RetentionTier::ShortTerm => "short_term",
            RetentionTier::LongTerm => "long_term",
            RetentionTier::Archived => "archived",
            RetentionTier::Canonical => "canonical",
        }
    }

    /// The tier one promotion step above this one, if any.
    /// The ladder ends at `LongTerm`; `Archived` and `Canonical` never promote.
    pub fn promoted(self) -> Option<RetentionTier> {
        match self {
            RetentionTier::Transitory => Some(RetentionTier::Temporary),
            RetentionTier::Temporary => Some(RetentionTier::ShortTerm),
            RetentionTier::ShortTerm => Some(RetentionTier::LongTerm),
            RetentionTier::LongTerm | RetentionTier::Archived | RetentionTier::Canonical => None,
        }
    }
}

impl fmt::Display for RetentionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetentionTier {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        RetentionTier::ALL
            .into_iter()
            .find(|tier| tier.as_str() == s)
            .ok_or_else(|| VaultError::InvalidTier(s.to_string()))
    }
}

/// Which kinds of processing the owner permits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PrivacyFlags {
    /// May be sent to a hosted model (OpenAI, Anthropic, ...).
    #[serde(default = "default_true")]
    pub remote_ai_allowed: bool,

    /// May be processed by a model running on the owner's machine.
    #[serde(default = "default_true")]
    pub local_ai_allowed: bool,

    /// May leave the vault through export.
    #[serde(default = "default_true")]
    pub export_allowed: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PrivacyFlags {
    fn default() -> Self {
        Self {
            remote_ai_allowed: true,
            local_ai_allowed: true,
            export_allowed: true,
        }
    }
}

/// Sensitivity classification of an entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Sensitivity {
    /// Clearance level, 0 (public) to 9 (top secret).
    #[serde(default = "default_level")]
    pub level: u8,

    #[serde(default)]
    pub privacy: PrivacyFlags,
}

fn default_level() -> u8 {
    1
}

impl Default for Sensitivity {
    fn default() -> Self {
        Self {
            level: default_level(),
            privacy: PrivacyFlags::default(),
        }
    }
}

impl Sensitivity {
    pub fn new(level: u8, privacy: PrivacyFlags) -> Result<Self> {
        let sensitivity = Self { level, privacy };
        sensitivity.validate()?;
        Ok(sensitivity)
    }

    pub fn validate(&self) -> Result<()> {
        if self.level > MAX_SENSITIVITY_LEVEL {
            return Err(VaultError::InvalidSensitivity(format!(
                "level {} out of range [0, {}]",
                self.level, MAX_SENSITIVITY_LEVEL
            )));
        }
        Ok(())
    }
}

/// How much of an entity may be handed to an automated model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExposureCode {
    /// Nothing. Not embedded, not indexed.
    Suppressed,

    /// The title only.
    TitleOnly,

    /// Title and full content.
    Full,
}

impl ExposureCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ExposureCode::Suppressed => "SUPPRESSED",
            ExposureCode::TitleOnly => "TITLE_ONLY",
            ExposureCode::Full => "FULL",
        }
    }

    pub fn may_embed(self) -> bool {
        !matches!(self, ExposureCode::Suppressed)
    }
}

impl fmt::Display for ExposureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-entity usage state consumed by lifecycle evolution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ImportanceSignal {
    /// Importance to the owner (0.0 - 1.0).
    #[serde(default = "default_importance")]
    pub importance: f32,

    /// Last time the entity was read or edited. None = never recorded.
    #[serde(default)]
    pub last_active_at: Option<DateTime<Utc>>,

    /// Pinned entities become canonical.
    #[serde(default)]
    pub pinned: bool,
}

fn default_importance() -> f32 {
    0.5
}

impl Default for ImportanceSignal {
    fn default() -> Self {
        Self {
            importance: default_importance(),
            last_active_at: None,
            pinned: false,
        }
    }
}

impl ImportanceSignal {
    pub fn validate(&self) -> Result<()> {
        if !self.importance.is_finite() || !(0.0..=1.0).contains(&self.importance) {
            return Err(VaultError::Validation(format!(
                "Importance {} out of range [0.0, 1.0]",
                self.importance
            )));
        }
        Ok(())
    }
}

/// An entity as delivered by the ingestion collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawEntity {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_tier")]
    pub tier: RetentionTier,
    #[serde(default)]
    pub sensitivity: Sensitivity,
    /// Opaque reference back to the source (usually a vault-relative path).
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub signal: Option<ImportanceSignal>,
}

fn default_tier() -> RetentionTier {
    RetentionTier::Transitory
}

impl RawEntity {
    pub fn new(id: impl Into<EntityId>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            tier: default_tier(),
            sensitivity: Sensitivity::default(),
            source: String::new(),
            signal: None,
        }
    }

    pub fn with_tier(mut self, tier: RetentionTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_sensitivity(mut self, sensitivity: Sensitivity) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_signal(mut self, signal: ImportanceSignal) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// An immutable snapshot of a knowledge entity.
///
/// The exposure code is derived from tier and sensitivity and cannot be set
/// directly. Changing either produces a new snapshot with a recomputed code.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub title: String,
    pub content: String,
    pub tier: RetentionTier,
    pub sensitivity: Sensitivity,
    pub source: String,
    exposure: ExposureCode,
}

impl Entity {
    /// Build an entity from an ingestion payload, validating it and
    /// computing its exposure code.
    pub fn from_raw(raw: &RawEntity) -> Result<Self> {
        if raw.id.trim().is_empty() {
            return Err(VaultError::Validation("Entity id must not be empty".to_string()));
        }
        let exposure = policy::compute_exposure_code(raw.tier, &raw.sensitivity)?;
        Ok(Self {
            id: raw.id.clone(),
            title: raw.title.clone(),
            content: raw.content.clone(),
            tier: raw.tier,
            sensitivity: raw.sensitivity,
            source: raw.source.clone(),
            exposure,
        })
    }

    pub fn exposure(&self) -> ExposureCode {
        self.exposure
    }

    /// New snapshot at a different tier.
    pub fn with_tier(&self, tier: RetentionTier) -> Result<Self> {
        let exposure = policy::compute_exposure_code(tier, &self.sensitivity)?;
        Ok(Self {
            tier,
            exposure,
            ..self.clone()
        })
    }

    /// New snapshot under a different classification.
    pub fn with_sensitivity(&self, sensitivity: Sensitivity) -> Result<Self> {
        let exposure = policy::compute_exposure_code(self.tier, &sensitivity)?;
        Ok(Self {
            sensitivity,
            exposure,
            ..self.clone()
        })
    }

    /// Back to the ingestion shape, for durable storage adapters.
    pub fn to_raw(&self, signal: Option<ImportanceSignal>) -> RawEntity {
        RawEntity {
            id: self.id.clone(),
            title: self.title.clone(),
            content: self.content.clone(),
            tier: self.tier,
            sensitivity: self.sensitivity,
            source: self.source.clone(),
            signal,
        }
    }
}

/// A directed, typed link between two entities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relationship {
    /// Unique identifier. UUIDv7.
    pub id: RelationshipId,

    /// Type label, e.g. "references", "parent_of", "blocks".
    pub relation: String,

    pub source: EntityId,

    pub target: EntityId,

    #[serde(default)]
    pub metadata: HashMap<String, Value>,

    pub created_at: DateTime<Utc>,
}

impl Relationship {
    /// The endpoint on the other side of `from`.
    pub fn other_end(&self, from: &str) -> &EntityId {
        if self.source == from {
            &self.target
        } else {
            &self.source
        }
    }

    pub fn touches(&self, id: &str) -> bool {
        self.source == id || self.target == id
    }
}

/// A relationship before it has been stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRelationship {
    pub relation: String,
    pub source: EntityId,
    pub target: EntityId,
    pub metadata: HashMap<String, Value>,
}

impl NewRelationship {
    pub fn new(
        source: impl Into<EntityId>,
        target: impl Into<EntityId>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            relation: relation.into(),
            source: source.into(),
            target: target.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Validate the shape of the relationship. Endpoint existence is
    /// checked by the graph against the live store.
    pub fn validate(&self) -> Result<()> {
        if self.source == self.target {
            return Err(VaultError::InvalidRelationship {
                reason: "Self-relationships are not allowed".to_string(),
            });
        }

        if self.relation.is_empty() || self.relation.len() > 64 {
            return Err(VaultError::InvalidRelationship {
                reason: format!("Relation '{}' must be 1-64 characters", self.relation),
            });
        }

        if !self
            .relation
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(VaultError::InvalidRelationship {
                reason: format!(
                    "Relation '{}' contains invalid characters (only lowercase alphanumeric, '_' and '-' allowed)",
                    self.relation
                ),
            });
        }

        Ok(())
    }

    pub(crate) fn into_relationship(self) -> Relationship {
        Relationship {
            id: Uuid::now_v7(),
            relation: self.relation,
            source: self.source,
            target: self.target,
            metadata: self.metadata,
            created_at: Utc::now(),
        }
    }
}

/// Audit record of one tier change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TierTransition {
    pub entity_id: EntityId,
    pub from: RetentionTier,
    pub to: RetentionTier,
    pub reason: String,
    /// False for manual overrides.
    pub automatic: bool,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_round_trips_through_str() {
        for tier in RetentionTier::ALL {
            assert_eq!(tier.as_str().parse::<RetentionTier>().unwrap(), tier);
        }
        assert!(matches!(
            "forever".parse::<RetentionTier>(),
            Err(VaultError::InvalidTier(_))
        ));
    }

    #[test]
    fn test_promotion_ladder_stops_at_long_term() {
        assert_eq!(RetentionTier::Transitory.promoted(), Some(RetentionTier::Temporary));
        assert_eq!(RetentionTier::ShortTerm.promoted(), Some(RetentionTier::LongTerm));
        assert_eq!(RetentionTier::LongTerm.promoted(), None);
        assert_eq!(RetentionTier::Archived.promoted(), None);
        assert_eq!(RetentionTier::Canonical.promoted(), None);
    }

    #[test]
    fn test_sensitivity_level_bounds() {
        assert!(Sensitivity::new(9, PrivacyFlags::default()).is_ok());
        assert!(matches!(
            Sensitivity::new(10, PrivacyFlags::default()),
            Err(VaultError::InvalidSensitivity(_))
        ));
    }

    #[test]
    fn test_raw_entity_defaults_from_json() {
        let raw: RawEntity = serde_json::from_str(r#"{"id": "n1", "title": "Note"}"#).unwrap();
        assert_eq!(raw.tier, RetentionTier::Transitory);
        assert_eq!(raw.sensitivity.level, 1);
        assert!(raw.sensitivity.privacy.remote_ai_allowed);
        assert!(raw.signal.is_none());
    }

    #[test]
    fn test_with_tier_recomputes_exposure() {
        let raw = RawEntity::new("n1", "Note", "Body").with_tier(RetentionTier::LongTerm);
        let entity = Entity::from_raw(&raw).unwrap();
        assert_eq!(entity.exposure(), ExposureCode::Full);

        let archived = entity.with_tier(RetentionTier::Archived).unwrap();
        assert_eq!(archived.exposure(), ExposureCode::TitleOnly);
        // The original snapshot is untouched
        assert_eq!(entity.tier, RetentionTier::LongTerm);
    }

    #[test]
    fn test_empty_id_rejected() {
        let raw = RawEntity::new("  ", "Note", "Body");
        assert!(Entity::from_raw(&raw).is_err());
    }

    #[test]
    fn test_relationship_validation() {
        assert!(NewRelationship::new("a", "b", "references").validate().is_ok());
        assert!(NewRelationship::new("a", "a", "references").validate().is_err());
        assert!(NewRelationship::new("a", "b", "").validate().is_err());
        assert!(NewRelationship::new("a", "b", "Related To").validate().is_err());
    }

    #[test]
    fn test_signal_validation() {
        assert!(ImportanceSignal::default().validate().is_ok());
        let bad = ImportanceSignal {
            importance: 1.5,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let nan = ImportanceSignal {
            importance: f32::NAN,
            ..Default::default()
        };
        assert!(nan.validate().is_err());
    }
}
