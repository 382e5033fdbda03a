//! Permission lookups the manager delegates to its host.

use std::collections::HashSet;

use parking_lot::RwLock;
use pps_model::Owner;

/// Decides whether an owner may exceed the fixed-effect limit.
pub trait FixedEffectAuthority: Send + Sync {
    fn has_unlimited_fixed_effects(&self, owner: Owner) -> bool;
}

/// Nobody is unlimited.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoUnlimited;

impl FixedEffectAuthority for NoUnlimited {
    fn has_unlimited_fixed_effects(&self, _owner: Owner) -> bool {
        false
    }
}

impl<F> FixedEffectAuthority for F
where
    F: Fn(Owner) -> bool + Send + Sync,
{
    fn has_unlimited_fixed_effects(&self, owner: Owner) -> bool {
        self(owner)
    }
}

/// Explicit grant list, editable at runtime.
#[derive(Debug, Default)]
pub struct UnlimitedOwners {
    owners: RwLock<HashSet<Owner>>,
}

impl UnlimitedOwners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, owner: Owner) -> bool {
        self.owners.write().insert(owner)
    }

    pub fn revoke(&self, owner: Owner) -> bool {
        self.owners.write().remove(&owner)
    }
}

impl FixedEffectAuthority for UnlimitedOwners {
    fn has_unlimited_fixed_effects(&self, owner: Owner) -> bool {
        self.owners.read().contains(&owner)
    }
}
