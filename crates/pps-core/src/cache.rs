use std::collections::hash_map::Entry;
use std::collections::HashMap;

use pps_model::{FixedEffect, GroupName, Owner, ParticleGroup, UserRecord};
use tracing::error;

/// Loaded user records, one per owner.
///
/// Owned by the foreground loop; other code only ever sees it through
/// foreground jobs. Mutation is crate-private so every edit goes through a
/// manager operation.
#[derive(Debug, Default)]
pub struct UserRecordCache {
    records: HashMap<Owner, UserRecord>,
}

impl UserRecordCache {
    pub fn get(&self, owner: Owner) -> Option<&UserRecord> {
        self.records.get(&owner)
    }

    pub fn contains(&self, owner: Owner) -> bool {
        self.records.contains_key(&owner)
    }

    pub fn owners(&self) -> impl Iterator<Item = Owner> + '_ {
        self.records.keys().copied()
    }

    pub fn records(&self) -> impl Iterator<Item = &UserRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Installs a freshly loaded record. A second install for the same owner
    /// means two loads raced; the first record stays.
    pub(crate) fn install(&mut self, record: UserRecord) -> &UserRecord {
        match self.records.entry(record.owner()) {
            Entry::Occupied(existing) => {
                debug_assert!(false, "record for {} installed twice", record.owner());
                error!(
                    target: "pps::cache",
                    owner = %record.owner(),
                    "record already cached; keeping the existing instance"
                );
                existing.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(record),
        }
    }

    pub(crate) fn remove(&mut self, owner: Owner) -> Option<UserRecord> {
        self.records.remove(&owner)
    }

    /// Returns false when the owner is not cached.
    pub(crate) fn upsert_group(&mut self, group: ParticleGroup) -> bool {
        match self.records.get_mut(&group.owner()) {
            Some(record) => {
                record.upsert_group(group);
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove_group(&mut self, owner: Owner, name: &GroupName) -> bool {
        self.records
            .get_mut(&owner)
            .and_then(|record| record.remove_group(name))
            .is_some()
    }

    pub(crate) fn add_fixed_effect(&mut self, effect: FixedEffect) -> bool {
        match self.records.get_mut(&effect.owner()) {
            Some(record) => {
                record.add_fixed_effect(effect);
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove_fixed_effect(&mut self, owner: Owner, id: u32) -> bool {
        self.records
            .get_mut(&owner)
            .and_then(|record| record.remove_fixed_effect(id))
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pps_model::{Location, ParticleDefinition, ParticleEffect, ParticleStyle};

    fn record(owner: Owner) -> UserRecord {
        UserRecord::assemble(owner, [], []).unwrap().0
    }

    #[test]
    fn edits_apply_only_to_cached_owners() {
        let owner = Owner::new_random();
        let stranger = Owner::new_random();
        let mut cache = UserRecordCache::default();
        cache.install(record(owner));

        let rain = ParticleGroup::new(owner, GroupName::named("rain").unwrap(), []).unwrap();
        assert!(cache.upsert_group(rain));
        let lost = ParticleGroup::new(stranger, GroupName::named("rain").unwrap(), []).unwrap();
        assert!(!cache.upsert_group(lost));
        assert!(!cache.contains(stranger));

        let particle =
            ParticleDefinition::with_default_data(owner, 1, ParticleEffect::Heart, ParticleStyle::Point)
                .unwrap();
        let fixed =
            FixedEffect::new(owner, 1, Location::new("world", 0.0, 0.0, 0.0).unwrap(), particle)
                .unwrap();
        assert!(cache.add_fixed_effect(fixed));
        assert_eq!(cache.get(owner).unwrap().fixed_effect_count(), 1);
        assert!(cache.remove_fixed_effect(owner, 1));
        assert!(!cache.remove_fixed_effect(owner, 1));

        assert!(cache.remove_group(owner, &GroupName::named("RAIN").unwrap()));
        assert_eq!(cache.get(owner).unwrap().groups().count(), 1);

        assert!(cache.remove(owner).is_some());
        assert!(cache.is_empty());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "installed twice")]
    fn double_install_trips_debug_assertion() {
        let owner = Owner::new_random();
        let mut cache = UserRecordCache::default();
        cache.install(record(owner));
        cache.install(record(owner));
    }

    #[test]
    fn owners_lists_every_cached_record() {
        let mut cache = UserRecordCache::default();
        let a = Owner::new_random();
        let b = Owner::new_random();
        cache.install(record(a));
        cache.install(record(b));
        let mut owners: Vec<_> = cache.owners().collect();
        owners.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(owners, expected);
        assert_eq!(cache.records().count(), 2);
        assert_eq!(cache.len(), 2);
    }
}
