use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{DataKind, NoteColor, OrdinaryColor, Owner, ParticleEffect, ParticleStyle, ValidationError};

pub const DEFAULT_ITEM_MATERIAL: &str = "IRON_SHOVEL";
pub const DEFAULT_BLOCK_MATERIAL: &str = "STONE";

/// Upper-case material identifier (`STONE`, `IRON_SHOVEL`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Material(String);

impl Material {
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        let trimmed = name.trim();
        let valid = !trimmed.is_empty()
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(ValidationError::Material(name.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn default_item() -> Self {
        Self(DEFAULT_ITEM_MATERIAL.to_string())
    }

    pub fn default_block() -> Self {
        Self(DEFAULT_BLOCK_MATERIAL.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Effect-specific payload. Which variant is legal is decided by
/// [`ParticleEffect::data_kind`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ParticleData {
    None,
    Color(OrdinaryColor),
    Note(NoteColor),
    Block(Material),
    Item(Material),
}

impl ParticleData {
    pub fn kind(&self) -> DataKind {
        match self {
            ParticleData::None => DataKind::None,
            ParticleData::Color(_) => DataKind::Color,
            ParticleData::Note(_) => DataKind::Note,
            ParticleData::Block(_) => DataKind::BlockMaterial,
            ParticleData::Item(_) => DataKind::ItemMaterial,
        }
    }

    /// Payload used when a caller picks an effect without specifying data.
    pub fn default_for(effect: ParticleEffect) -> Self {
        match effect.data_kind() {
            DataKind::None => ParticleData::None,
            DataKind::Color => ParticleData::Color(OrdinaryColor::BLACK),
            DataKind::Note => ParticleData::Note(NoteColor::RAINBOW),
            DataKind::BlockMaterial => ParticleData::Block(Material::default_block()),
            DataKind::ItemMaterial => ParticleData::Item(Material::default_item()),
        }
    }
}

/// One particle definition: an effect drawn with a style, plus its payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ParticleDefinition {
    owner: Owner,
    id: u32,
    effect: ParticleEffect,
    style: ParticleStyle,
    data: ParticleData,
}

impl ParticleDefinition {
    pub fn new(
        owner: Owner,
        id: u32,
        effect: ParticleEffect,
        style: ParticleStyle,
        data: ParticleData,
    ) -> Result<Self, ValidationError> {
        if id == 0 {
            return Err(ValidationError::ParticleId);
        }
        let expected = effect.data_kind();
        if data.kind() != expected {
            return Err(ValidationError::DataMismatch {
                effect: effect.name(),
                expected: expected.as_str(),
                actual: data.kind().as_str(),
            });
        }
        Ok(Self {
            owner,
            id,
            effect,
            style,
            data,
        })
    }

    pub fn with_default_data(
        owner: Owner,
        id: u32,
        effect: ParticleEffect,
        style: ParticleStyle,
    ) -> Result<Self, ValidationError> {
        Self::new(owner, id, effect, style, ParticleData::default_for(effect))
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn effect(&self) -> ParticleEffect {
        self.effect
    }

    pub fn style(&self) -> ParticleStyle {
        self.style
    }

    pub fn data(&self) -> &ParticleData {
        &self.data
    }

    pub fn color(&self) -> Option<OrdinaryColor> {
        match self.data {
            ParticleData::Color(c) => Some(c),
            _ => None,
        }
    }

    pub fn note(&self) -> Option<NoteColor> {
        match self.data {
            ParticleData::Note(n) => Some(n),
            _ => None,
        }
    }

    pub fn material(&self) -> Option<&Material> {
        match &self.data {
            ParticleData::Block(m) | ParticleData::Item(m) => Some(m),
            _ => None,
        }
    }
}
