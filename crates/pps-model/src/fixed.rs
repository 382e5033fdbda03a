use serde::Serialize;

use crate::{Owner, ParticleDefinition, ValidationError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    world: String,
    x: f64,
    y: f64,
    z: f64,
}

impl Location {
    pub fn new(world: &str, x: f64, y: f64, z: f64) -> Result<Self, ValidationError> {
        if world.trim().is_empty() {
            return Err(ValidationError::World);
        }
        for (axis, v) in [("x", x), ("y", y), ("z", z)] {
            if !v.is_finite() {
                return Err(ValidationError::Coordinate(axis));
            }
        }
        Ok(Self {
            world: world.to_string(),
            x,
            y,
            z,
        })
    }

    pub fn world(&self) -> &str {
        &self.world
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn z(&self) -> f64 {
        self.z
    }

    pub fn distance_squared(&self, other: &Location) -> Option<f64> {
        if self.world != other.world {
            return None;
        }
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        Some(dx * dx + dy * dy + dz * dz)
    }
}

/// A definition anchored at a world location, addressed by a per-owner id.
#[derive(Debug, Clone, Serialize)]
pub struct FixedEffect {
    owner: Owner,
    id: u32,
    location: Location,
    particle: ParticleDefinition,
}

impl FixedEffect {
    pub fn new(
        owner: Owner,
        id: u32,
        location: Location,
        particle: ParticleDefinition,
    ) -> Result<Self, ValidationError> {
        if id == 0 {
            return Err(ValidationError::FixedEffectId);
        }
        if particle.owner() != owner {
            return Err(ValidationError::OwnerMismatch {
                expected: owner.to_string(),
                found: particle.owner().to_string(),
            });
        }
        Ok(Self {
            owner,
            id,
            location,
            particle,
        })
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn particle(&self) -> &ParticleDefinition {
        &self.particle
    }

    pub fn content_eq(&self, other: &Self) -> bool {
        self == other && self.location == other.location && self.particle == other.particle
    }
}

impl PartialEq for FixedEffect {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.id == other.id
    }
}

impl Eq for FixedEffect {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ParticleEffect, ParticleStyle};

    #[test]
    fn validates_id_location_and_owner() {
        let owner = Owner::new_random();
        let particle =
            ParticleDefinition::with_default_data(owner, 1, ParticleEffect::Flame, ParticleStyle::Point)
                .unwrap();
        let here = Location::new("world", 1.0, 64.0, -3.5).unwrap();
        assert!(FixedEffect::new(owner, 1, here.clone(), particle.clone()).is_ok());
        assert_eq!(
            FixedEffect::new(owner, 0, here.clone(), particle.clone()).unwrap_err(),
            ValidationError::FixedEffectId
        );
        assert!(FixedEffect::new(Owner::new_random(), 1, here, particle).is_err());
        assert_eq!(
            Location::new("world", f64::NAN, 0.0, 0.0).unwrap_err(),
            ValidationError::Coordinate("x")
        );
        assert_eq!(Location::new(" ", 0.0, 0.0, 0.0).unwrap_err(), ValidationError::World);
    }

    #[test]
    fn distance_only_within_same_world() {
        let a = Location::new("world", 0.0, 0.0, 0.0).unwrap();
        let b = Location::new("world", 3.0, 4.0, 0.0).unwrap();
        let c = Location::new("nether", 3.0, 4.0, 0.0).unwrap();
        assert_eq!(a.distance_squared(&b), Some(25.0));
        assert_eq!(a.distance_squared(&c), None);
    }
}
