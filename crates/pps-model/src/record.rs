use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{FixedEffect, GroupName, ParticleGroup, ValidationError};

/// Stable identity of a tracked user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Owner(Uuid);

impl Owner {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Owner {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ValidationError::Owner(s.to_string()))
    }
}

/// Smallest positive integer not present in `ids`.
pub fn smallest_unused_id(ids: impl IntoIterator<Item = u32>) -> u32 {
    let mut taken: Vec<u32> = ids.into_iter().filter(|id| *id > 0).collect();
    taken.sort_unstable();
    taken.dedup();
    let mut candidate = 1;
    for id in taken {
        if id != candidate {
            break;
        }
        candidate += 1;
    }
    candidate
}

/// Everything cached for one owner: groups (always including the active one)
/// and fixed effects.
#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    owner: Owner,
    groups: BTreeMap<String, ParticleGroup>,
    fixed_effects: BTreeMap<u32, FixedEffect>,
}

impl UserRecord {
    /// Builds a record from stored parts. When no active group is present an
    /// empty one is added; the returned flag tells the caller it still has
    /// to be persisted.
    pub fn assemble(
        owner: Owner,
        groups: impl IntoIterator<Item = ParticleGroup>,
        fixed_effects: impl IntoIterator<Item = FixedEffect>,
    ) -> Result<(Self, bool), ValidationError> {
        let mut by_name = BTreeMap::new();
        for group in groups {
            check_owner(owner, group.owner())?;
            let key = group.name().key();
            if by_name.contains_key(&key) {
                return Err(ValidationError::DuplicateGroup(group.name().to_string()));
            }
            by_name.insert(key, group);
        }
        let mut by_id = BTreeMap::new();
        for effect in fixed_effects {
            check_owner(owner, effect.owner())?;
            let id = effect.id();
            if by_id.insert(id, effect).is_some() {
                return Err(ValidationError::DuplicateFixedEffect(id));
            }
        }
        let mut record = Self {
            owner,
            groups: by_name,
            fixed_effects: by_id,
        };
        let synthesized = record.active_group().is_none();
        if synthesized {
            record.upsert_group(ParticleGroup::active(owner));
        }
        Ok((record, synthesized))
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    pub fn active_group(&self) -> Option<&ParticleGroup> {
        self.groups.get(&GroupName::active().key())
    }

    pub fn group(&self, name: &GroupName) -> Option<&ParticleGroup> {
        self.groups.get(&name.key())
    }

    pub fn groups(&self) -> impl Iterator<Item = &ParticleGroup> {
        self.groups.values()
    }

    pub fn fixed_effect(&self, id: u32) -> Option<&FixedEffect> {
        self.fixed_effects.get(&id)
    }

    pub fn fixed_effects(&self) -> impl Iterator<Item = &FixedEffect> {
        self.fixed_effects.values()
    }

    pub fn fixed_effect_ids(&self) -> Vec<u32> {
        self.fixed_effects.keys().copied().collect()
    }

    pub fn fixed_effect_count(&self) -> usize {
        self.fixed_effects.len()
    }

    pub fn next_fixed_effect_id(&self) -> u32 {
        smallest_unused_id(self.fixed_effects.keys().copied())
    }

    /// Inserts or replaces the group with the same case-insensitive name.
    pub fn upsert_group(&mut self, group: ParticleGroup) {
        self.groups.insert(group.name().key(), group);
    }

    pub fn remove_group(&mut self, name: &GroupName) -> Option<ParticleGroup> {
        self.groups.remove(&name.key())
    }

    pub fn add_fixed_effect(&mut self, effect: FixedEffect) {
        self.fixed_effects.insert(effect.id(), effect);
    }

    pub fn remove_fixed_effect(&mut self, id: u32) -> Option<FixedEffect> {
        self.fixed_effects.remove(&id)
    }

    /// Deep comparison of every group and fixed effect.
    pub fn content_eq(&self, other: &Self) -> bool {
        self.owner == other.owner
            && self.groups.len() == other.groups.len()
            && self.fixed_effects.len() == other.fixed_effects.len()
            && self
                .groups
                .iter()
                .all(|(k, g)| other.groups.get(k).is_some_and(|o| g.content_eq(o)))
            && self
                .fixed_effects
                .iter()
                .all(|(id, f)| other.fixed_effects.get(id).is_some_and(|o| f.content_eq(o)))
    }
}

fn check_owner(expected: Owner, found: Owner) -> Result<(), ValidationError> {
    if expected != found {
        return Err(ValidationError::OwnerMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Location, ParticleDefinition, ParticleEffect, ParticleStyle};

    fn fixed(owner: Owner, id: u32) -> FixedEffect {
        let particle =
            ParticleDefinition::with_default_data(owner, 1, ParticleEffect::Flame, ParticleStyle::Point)
                .unwrap();
        FixedEffect::new(owner, id, Location::new("world", 0.0, 0.0, 0.0).unwrap(), particle)
            .unwrap()
    }

    #[test]
    fn smallest_unused_id_fills_gaps() {
        assert_eq!(smallest_unused_id([1, 2, 4]), 3);
        assert_eq!(smallest_unused_id([1, 2, 3]), 4);
        assert_eq!(smallest_unused_id([]), 1);
        assert_eq!(smallest_unused_id([3, 2]), 1);
        assert_eq!(smallest_unused_id([2, 1, 1]), 3);
    }

    #[test]
    fn assemble_synthesizes_missing_active_group() {
        let owner = Owner::new_random();
        let (record, synthesized) = UserRecord::assemble(owner, [], []).unwrap();
        assert!(synthesized);
        assert!(record.active_group().is_some());
        assert_eq!(record.groups().count(), 1);

        let (again, synthesized) =
            UserRecord::assemble(owner, [ParticleGroup::active(owner)], []).unwrap();
        assert!(!synthesized);
        assert!(again.content_eq(&record));
    }

    #[test]
    fn assemble_rejects_case_insensitive_duplicates() {
        let owner = Owner::new_random();
        let a = ParticleGroup::new(owner, GroupName::named("Fire").unwrap(), []).unwrap();
        let b = ParticleGroup::new(owner, GroupName::named("fire").unwrap(), []).unwrap();
        assert!(matches!(
            UserRecord::assemble(owner, [a, b], []),
            Err(ValidationError::DuplicateGroup(_))
        ));
    }

    #[test]
    fn next_fixed_effect_id_uses_cached_ids() {
        let owner = Owner::new_random();
        let (record, _) =
            UserRecord::assemble(owner, [], [fixed(owner, 1), fixed(owner, 2), fixed(owner, 4)])
                .unwrap();
        assert_eq!(record.next_fixed_effect_id(), 3);
        assert_eq!(record.fixed_effect_ids(), vec![1, 2, 4]);
    }

    #[test]
    fn upsert_replaces_by_folded_name() {
        let owner = Owner::new_random();
        let (mut record, _) = UserRecord::assemble(owner, [], []).unwrap();
        record.upsert_group(ParticleGroup::new(owner, GroupName::named("Rain").unwrap(), []).unwrap());
        record.upsert_group(ParticleGroup::new(owner, GroupName::named("RAIN").unwrap(), []).unwrap());
        assert_eq!(record.groups().count(), 2);
        let rain = record.group(&GroupName::named("rain").unwrap()).unwrap();
        assert_eq!(rain.name().as_str(), "RAIN");
        assert!(record.remove_group(&GroupName::named("rain").unwrap()).is_some());
        assert!(record.remove_fixed_effect(9).is_none());
    }
}
