//! Construction-time configuration.
//!
//! Every knob has a sensible default, so a partial (or absent) YAML file
//! works; unknown hands fall back to the documented MIDI ranges.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

// ════════════════════════════════════════════════════════════════════════════
// Config structs
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FieldConfig {
    pub detector:   DetectorConfig,
    pub mapper:     MapperConfig,
    pub lifecycle:  LifecycleConfig,
    pub recognizer: RecognizerSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DetectorConfig {
    /// Hands below this tracking confidence are skipped for the tick.
    pub confidence_threshold: f32,
    /// Near-but-not-touching distance for proximity events.
    pub proximity_radius: f32,
    /// Cooldown applied to objects that do not set their own.
    pub default_cooldown_ms: u64,
    /// Spatial hash cell edge, in normalised world units.
    pub grid_size: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            confidence_threshold: 0.5,
            proximity_radius:     0.15,
            default_cooldown_ms:  250,
            grid_size:            0.2,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapperConfig {
    /// EMA weight on the previous mapping (0 = no smoothing).
    pub smoothing_factor: f32,
    pub velocity: VelocityRange,
    pub left:  HandRange,
    pub right: HandRange,
}

impl Default for MapperConfig {
    fn default() -> Self {
        MapperConfig {
            smoothing_factor: 0.8,
            velocity: VelocityRange::default(),
            // Left hand covers the bass half, right the treble half.
            left:  HandRange { start_midi: 48, end_midi: 72, octaves: 2 },
            right: HandRange { start_midi: 60, end_midi: 84, octaves: 2 },
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct VelocityRange {
    pub min: u8,
    pub max: u8,
}

impl Default for VelocityRange {
    fn default() -> Self {
        VelocityRange { min: 40, max: 127 }
    }
}

/// Per-handedness pitch range.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct HandRange {
    pub start_midi: u8,
    pub end_midi:   u8,
    /// Octaves spanned by the vertical axis.
    pub octaves:    u8,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Dwell in Touched before Playing begins.
    pub hold_ms: u64,
    /// Dwell in Playing before the fade starts.
    pub play_ms: u64,
    /// Dwell in Fading before the object returns to Idle.
    pub fade_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        LifecycleConfig { hold_ms: 0, play_ms: 500, fade_ms: 1000 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RecognizerSettings {
    /// Trailing window merged into scale lookups.
    pub scale_window_ms: u64,
    pub history_cap: usize,
    pub cache_cap: usize,
    /// How long a triggered note counts as "sounding".
    pub sustain_ms: u64,
}

impl Default for RecognizerSettings {
    fn default() -> Self {
        RecognizerSettings {
            scale_window_ms: 5000,
            history_cap:     100,
            cache_cap:       256,
            sustain_ms:      1500,
        }
    }
}

impl RecognizerSettings {
    pub fn to_theory(&self) -> chime_theory::RecognizerConfig {
        chime_theory::RecognizerConfig {
            scale_window_ms: self.scale_window_ms,
            history_cap:     self.history_cap,
            cache_cap:       self.cache_cap,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Loading
// ════════════════════════════════════════════════════════════════════════════

impl FieldConfig {
    /// Load from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("cannot open config file {}", path.display()))?;
        let config: FieldConfig = serde_yaml::from_reader(file)
            .with_context(|| format!("malformed config file {}", path.display()))?;
        Ok(config)
    }

    /// Pitch range for one handedness.
    pub fn range(&self, handedness: crate::hand::Handedness) -> HandRange {
        match handedness {
            crate::hand::Handedness::Left  => self.mapper.left,
            crate::hand::Handedness::Right => self.mapper.right,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
