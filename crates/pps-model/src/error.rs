use thiserror::Error;

/// Rejections raised while constructing model values. A value that fails
/// validation never reaches the cache or the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{component} value {value} is outside 0..=255")]
    ColorComponent { component: &'static str, value: i32 },
    #[error("note value {0} is outside 0..=24")]
    Note(i32),
    #[error("invalid material name '{0}'")]
    Material(String),
    #[error("invalid group name '{0}'")]
    GroupName(String),
    #[error("particle id must be positive")]
    ParticleId,
    #[error("fixed effect id must be positive")]
    FixedEffectId,
    #[error("effect '{effect}' expects {expected} data, got {actual}")]
    DataMismatch {
        effect: &'static str,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("duplicate particle id {0}")]
    DuplicateParticleId(u32),
    #[error("duplicate group '{0}'")]
    DuplicateGroup(String),
    #[error("duplicate fixed effect id {0}")]
    DuplicateFixedEffect(u32),
    #[error("value belongs to owner {found}, expected {expected}")]
    OwnerMismatch { expected: String, found: String },
    #[error("unknown effect '{0}'")]
    UnknownEffect(String),
    #[error("unknown style '{0}'")]
    UnknownStyle(String),
    #[error("invalid owner id '{0}'")]
    Owner(String),
    #[error("world name must not be empty")]
    World,
    #[error("{0} coordinate is not finite")]
    Coordinate(&'static str),
    #[error("the active group cannot be removed")]
    ActiveGroupRemoval,
}
