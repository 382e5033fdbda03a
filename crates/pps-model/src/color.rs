use serde::{Deserialize, Serialize};

use crate::ValidationError;

const RGB_RAINBOW: u16 = 999;
const RGB_RANDOM: u16 = 998;
const NOTE_RAINBOW: u8 = 99;
const NOTE_RANDOM: u8 = 98;
const NOTE_MAX: i32 = 24;

/// RGB color payload. Components are 0..=255, or the whole triple is one of
/// the rainbow / random sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrdinaryColor {
    red: u16,
    green: u16,
    blue: u16,
}

impl OrdinaryColor {
    pub const RAINBOW: OrdinaryColor = OrdinaryColor {
        red: RGB_RAINBOW,
        green: RGB_RAINBOW,
        blue: RGB_RAINBOW,
    };
    pub const RANDOM: OrdinaryColor = OrdinaryColor {
        red: RGB_RANDOM,
        green: RGB_RANDOM,
        blue: RGB_RANDOM,
    };
    pub const BLACK: OrdinaryColor = OrdinaryColor {
        red: 0,
        green: 0,
        blue: 0,
    };

    pub fn new(red: i32, green: i32, blue: i32) -> Result<Self, ValidationError> {
        for sentinel in [Self::RAINBOW, Self::RANDOM] {
            let s = i32::from(sentinel.red);
            if red == s && green == s && blue == s {
                return Ok(sentinel);
            }
        }
        Ok(Self {
            red: component("red", red)?,
            green: component("green", green)?,
            blue: component("blue", blue)?,
        })
    }

    pub fn red(&self) -> u16 {
        self.red
    }

    pub fn green(&self) -> u16 {
        self.green
    }

    pub fn blue(&self) -> u16 {
        self.blue
    }

    pub fn is_rainbow(&self) -> bool {
        *self == Self::RAINBOW
    }

    pub fn is_random(&self) -> bool {
        *self == Self::RANDOM
    }

    /// Offset value handed to the renderer for the red channel.
    pub fn value_x(&self) -> f32 {
        self.normalized(self.red)
    }

    pub fn value_y(&self) -> f32 {
        self.normalized(self.green)
    }

    pub fn value_z(&self) -> f32 {
        self.normalized(self.blue)
    }

    fn normalized(&self, channel: u16) -> f32 {
        if self.is_rainbow() || self.is_random() {
            return 0.0;
        }
        f32::from(channel) / 255.0
    }
}

fn component(name: &'static str, value: i32) -> Result<u16, ValidationError> {
    if (0..=255).contains(&value) {
        Ok(value as u16)
    } else {
        Err(ValidationError::ColorComponent {
            component: name,
            value,
        })
    }
}

/// Note color payload: a discretized hue index 0..=24 or a sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteColor {
    note: u8,
}

impl NoteColor {
    pub const RAINBOW: NoteColor = NoteColor { note: NOTE_RAINBOW };
    pub const RANDOM: NoteColor = NoteColor { note: NOTE_RANDOM };

    pub fn new(note: i32) -> Result<Self, ValidationError> {
        if note == i32::from(NOTE_RAINBOW) || note == i32::from(NOTE_RANDOM) {
            return Ok(Self { note: note as u8 });
        }
        if !(0..=NOTE_MAX).contains(&note) {
            return Err(ValidationError::Note(note));
        }
        Ok(Self { note: note as u8 })
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn is_rainbow(&self) -> bool {
        *self == Self::RAINBOW
    }

    pub fn is_random(&self) -> bool {
        *self == Self::RANDOM
    }

    pub fn value_x(&self) -> f32 {
        f32::from(self.note) / NOTE_MAX as f32
    }

    pub fn value_y(&self) -> f32 {
        0.0
    }

    pub fn value_z(&self) -> f32 {
        0.0
    }
}
