use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Which payload variant a definition carries for a given effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    None,
    Color,
    Note,
    BlockMaterial,
    ItemMaterial,
}

impl DataKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DataKind::None => "no",
            DataKind::Color => "color",
            DataKind::Note => "note",
            DataKind::BlockMaterial => "block material",
            DataKind::ItemMaterial => "item material",
        }
    }
}

macro_rules! effects {
    (@kind) => { DataKind::None };
    (@kind $kind:ident) => { DataKind::$kind };
    (@enabled) => { true };
    (@enabled $off:literal) => { $off };
    ($($variant:ident => $name:literal $(: $kind:ident)? $(, disabled $off:literal)?;)*) => {
        /// Visual effect kinds, named by their lowercase storage names.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum ParticleEffect {
            $($variant,)*
        }

        impl ParticleEffect {
            pub const ALL: &'static [ParticleEffect] = &[$(ParticleEffect::$variant,)*];

            pub fn name(self) -> &'static str {
                match self {
                    $(ParticleEffect::$variant => $name,)*
                }
            }

            pub fn data_kind(self) -> DataKind {
                match self {
                    $(ParticleEffect::$variant => effects!(@kind $($kind)?),)*
                }
            }

            /// Effects that are too disruptive are shipped switched off.
            pub fn enabled_by_default(self) -> bool {
                match self {
                    $(ParticleEffect::$variant => effects!(@enabled $($off)?),)*
                }
            }
        }
    };
}

effects! {
    AmbientEntityEffect => "ambient_entity_effect": Color;
    AngryVillager => "angry_villager";
    Barrier => "barrier";
    Block => "block": BlockMaterial;
    Bubble => "bubble";
    BubbleColumnUp => "bubble_column_up";
    BubblePop => "bubble_pop";
    CampfireCosySmoke => "campfire_cosy_smoke";
    CampfireSignalSmoke => "campfire_signal_smoke";
    Cloud => "cloud";
    Composter => "composter";
    Crit => "crit";
    CurrentDown => "current_down";
    DamageIndicator => "damage_indicator";
    Dolphin => "dolphin";
    DragonBreath => "dragon_breath";
    DrippingHoney => "dripping_honey";
    DrippingLava => "dripping_lava";
    DrippingWater => "dripping_water";
    Dust => "dust": Color;
    ElderGuardian => "elder_guardian", disabled false;
    Enchant => "enchant";
    EnchantedHit => "enchanted_hit";
    EndRod => "end_rod";
    EntityEffect => "entity_effect": Color;
    Explosion => "explosion";
    ExplosionEmitter => "explosion_emitter";
    FallingDust => "falling_dust": BlockMaterial;
    FallingHoney => "falling_honey";
    FallingLava => "falling_lava";
    FallingNectar => "falling_nectar";
    FallingWater => "falling_water";
    Firework => "firework";
    Fishing => "fishing";
    Flame => "flame";
    Flash => "flash", disabled false;
    Footstep => "footstep";
    HappyVillager => "happy_villager";
    Heart => "heart";
    InstantEffect => "instant_effect";
    Item => "item": ItemMaterial;
    ItemSlime => "item_slime";
    ItemSnowball => "item_snowball";
    LandingHoney => "landing_honey";
    LandingLava => "landing_lava";
    LargeSmoke => "large_smoke";
    Lava => "lava";
    Mycelium => "mycelium";
    Nautilus => "nautilus";
    Note => "note": Note;
    Poof => "poof";
    Portal => "portal";
    Rain => "rain";
    Smoke => "smoke";
    Sneeze => "sneeze";
    Spell => "spell";
    Spit => "spit";
    Splash => "splash";
    SquidInk => "squid_ink";
    SweepAttack => "sweep_attack";
    TotemOfUndying => "totem_of_undying";
    Underwater => "underwater";
    Witch => "witch";
}

impl ParticleEffect {
    pub fn is_colorable(self) -> bool {
        matches!(self.data_kind(), DataKind::Color | DataKind::Note)
    }

    pub fn requires_material(self) -> bool {
        matches!(
            self.data_kind(),
            DataKind::BlockMaterial | DataKind::ItemMaterial
        )
    }
}

impl fmt::Display for ParticleEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParticleEffect {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|e| e.name().eq_ignore_ascii_case(needle))
            .ok_or_else(|| ValidationError::UnknownEffect(s.to_string()))
    }
}

/// Spatial patterns a definition is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticleStyle {
    Arrows,
    Batman,
    Beam,
    BlockBreak,
    BlockPlace,
    Celebration,
    Chains,
    Companion,
    Cube,
    Feet,
    Halo,
    Hurt,
    Invocation,
    Move,
    Normal,
    Orbit,
    Overhead,
    Point,
    Popper,
    Pulse,
    QuadHelix,
    Rings,
    Sphere,
    Spin,
    Spiral,
    Swords,
    Thick,
    Twins,
    Vortex,
    Whirl,
    Whirlwind,
    Wings,
}

impl ParticleStyle {
    pub const ALL: &'static [ParticleStyle] = &[
        ParticleStyle::Arrows,
        ParticleStyle::Batman,
        ParticleStyle::Beam,
        ParticleStyle::BlockBreak,
        ParticleStyle::BlockPlace,
        ParticleStyle::Celebration,
        ParticleStyle::Chains,
        ParticleStyle::Companion,
        ParticleStyle::Cube,
        ParticleStyle::Feet,
        ParticleStyle::Halo,
        ParticleStyle::Hurt,
        ParticleStyle::Invocation,
        ParticleStyle::Move,
        ParticleStyle::Normal,
        ParticleStyle::Orbit,
        ParticleStyle::Overhead,
        ParticleStyle::Point,
        ParticleStyle::Popper,
        ParticleStyle::Pulse,
        ParticleStyle::QuadHelix,
        ParticleStyle::Rings,
        ParticleStyle::Sphere,
        ParticleStyle::Spin,
        ParticleStyle::Spiral,
        ParticleStyle::Swords,
        ParticleStyle::Thick,
        ParticleStyle::Twins,
        ParticleStyle::Vortex,
        ParticleStyle::Whirl,
        ParticleStyle::Whirlwind,
        ParticleStyle::Wings,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ParticleStyle::Arrows => "arrows",
            ParticleStyle::Batman => "batman",
            ParticleStyle::Beam => "beam",
            ParticleStyle::BlockBreak => "blockbreak",
            ParticleStyle::BlockPlace => "blockplace",
            ParticleStyle::Celebration => "celebration",
            ParticleStyle::Chains => "chains",
            ParticleStyle::Companion => "companion",
            ParticleStyle::Cube => "cube",
            ParticleStyle::Feet => "feet",
            ParticleStyle::Halo => "halo",
            ParticleStyle::Hurt => "hurt",
            ParticleStyle::Invocation => "invocation",
            ParticleStyle::Move => "move",
            ParticleStyle::Normal => "normal",
            ParticleStyle::Orbit => "orbit",
            ParticleStyle::Overhead => "overhead",
            ParticleStyle::Point => "point",
            ParticleStyle::Popper => "popper",
            ParticleStyle::Pulse => "pulse",
            ParticleStyle::QuadHelix => "quadhelix",
            ParticleStyle::Rings => "rings",
            ParticleStyle::Sphere => "sphere",
            ParticleStyle::Spin => "spin",
            ParticleStyle::Spiral => "spiral",
            ParticleStyle::Swords => "swords",
            ParticleStyle::Thick => "thick",
            ParticleStyle::Twins => "twins",
            ParticleStyle::Vortex => "vortex",
            ParticleStyle::Whirl => "whirl",
            ParticleStyle::Whirlwind => "whirlwind",
            ParticleStyle::Wings => "wings",
        }
    }
}

impl fmt::Display for ParticleStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParticleStyle {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|st| st.name().eq_ignore_ascii_case(needle))
            .ok_or_else(|| ValidationError::UnknownStyle(s.to_string()))
    }
}
