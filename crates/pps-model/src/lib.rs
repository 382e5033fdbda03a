//! Value types for per-user particle configuration: definitions, groups,
//! fixed effects and the cached user record that bundles them.
//!
//! Every type validates on construction; once built, a value is consistent
//! (colors in range, payload matching its effect, unique ids per collection).

mod color;
mod definition;
mod effect;
mod error;
mod fixed;
mod group;
mod record;

pub use color::{NoteColor, OrdinaryColor};
pub use definition::{
    Material, ParticleData, ParticleDefinition, DEFAULT_BLOCK_MATERIAL, DEFAULT_ITEM_MATERIAL,
};
pub use effect::{DataKind, ParticleEffect, ParticleStyle};
pub use error::ValidationError;
pub use fixed::{FixedEffect, Location};
pub use group::{GroupName, ParticleGroup};
pub use record::{smallest_unused_id, Owner, UserRecord};
