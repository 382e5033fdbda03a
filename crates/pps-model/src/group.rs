use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::{Owner, ParticleDefinition, ValidationError};

const MAX_GROUP_NAME_LEN: usize = 100;

/// Group name; compared case-insensitively. The empty name is reserved for
/// the active group.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct GroupName(String);

impl GroupName {
    pub fn active() -> Self {
        Self(String::new())
    }

    pub fn named(name: &str) -> Result<Self, ValidationError> {
        let valid = !name.is_empty()
            && name.len() <= MAX_GROUP_NAME_LEN
            && !name.chars().any(char::is_whitespace);
        if !valid {
            return Err(ValidationError::GroupName(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    /// Decodes the stored representation, where the empty string is the
    /// active group.
    pub fn from_stored(name: &str) -> Result<Self, ValidationError> {
        if name.is_empty() {
            Ok(Self::active())
        } else {
            Self::named(name)
        }
    }

    pub fn is_active(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-folded key used for lookups.
    pub fn key(&self) -> String {
        self.0.to_lowercase()
    }
}

impl PartialEq for GroupName {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for GroupName {}

impl Hash for GroupName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_active() {
            f.write_str("<active>")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// Named collection of definitions. Identity is owner + case-folded name;
/// use [`ParticleGroup::content_eq`] to compare contents.
#[derive(Debug, Clone, Serialize)]
pub struct ParticleGroup {
    owner: Owner,
    name: GroupName,
    particles: BTreeMap<u32, ParticleDefinition>,
}

impl ParticleGroup {
    pub fn new(
        owner: Owner,
        name: GroupName,
        particles: impl IntoIterator<Item = ParticleDefinition>,
    ) -> Result<Self, ValidationError> {
        let mut map = BTreeMap::new();
        for particle in particles {
            if particle.owner() != owner {
                return Err(ValidationError::OwnerMismatch {
                    expected: owner.to_string(),
                    found: particle.owner().to_string(),
                });
            }
            let id = particle.id();
            if map.insert(id, particle).is_some() {
                return Err(ValidationError::DuplicateParticleId(id));
            }
        }
        Ok(Self {
            owner,
            name,
            particles: map,
        })
    }

    pub fn active(owner: Owner) -> Self {
        Self {
            owner,
            name: GroupName::active(),
            particles: BTreeMap::new(),
        }
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    pub fn name(&self) -> &GroupName {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.name.is_active()
    }

    pub fn particles(&self) -> impl Iterator<Item = &ParticleDefinition> {
        self.particles.values()
    }

    pub fn particle(&self, id: u32) -> Option<&ParticleDefinition> {
        self.particles.get(&id)
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Same identity, same exact name casing and the same definitions.
    pub fn content_eq(&self, other: &Self) -> bool {
        self == other && self.name.as_str() == other.name.as_str() && self.particles == other.particles
    }
}

impl PartialEq for ParticleGroup {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.name == other.name
    }
}

impl Eq for ParticleGroup {}
