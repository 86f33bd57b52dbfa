//! Player configuration
//!
//! Loaded from an optional TOML file and overridden by `RESONANCE_*`
//! environment variables, with `__` separating nested keys:
//!
//! ```text
//! RESONANCE_PLAYBACK__VOLUME=60
//! RESONANCE_EQUALIZER__PRESET=rock
//! RESONANCE_SPECTRUM__BUCKETS=32
//! ```

use crate::error::{PlaybackError, Result};
use crate::types::RepeatMode;
use resonance_audio::effects::{EqPreset, EqSettings, MAX_BASS_BOOST_DB};
use resonance_audio::SpectrumConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "resonance";

const ENV_PREFIX: &str = "RESONANCE";

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct PlayerConfig {
    #[serde(default)]
    pub playback: PlaybackSettings,

    #[serde(default)]
    pub equalizer: EqualizerSettings,

    #[serde(default)]
    pub spectrum: SpectrumConfig,

    #[serde(default)]
    pub engine: EngineSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlaybackSettings {
    /// Master volume, 0-100
    #[serde(default = "default_volume")]
    pub volume: u8,

    #[serde(default)]
    pub repeat: RepeatMode,

    #[serde(default)]
    pub shuffle: bool,

    /// Frames rendered per engine block
    #[serde(default = "default_block_frames")]
    pub block_frames: usize,

    /// Interval between position events, in milliseconds of audio
    #[serde(default = "default_position_update_ms")]
    pub position_update_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EqualizerSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_preset")]
    pub preset: EqPreset,

    /// Overrides the preset's bass boost when set
    #[serde(default)]
    pub bass_boost_db: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineSettings {
    /// Control → audio queue depth
    #[serde(default = "default_command_capacity")]
    pub command_capacity: usize,

    /// Audio → control queue depth
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_volume() -> u8 {
    80
}

fn default_block_frames() -> usize {
    1024
}

fn default_position_update_ms() -> u64 {
    250
}

fn default_enabled() -> bool {
    true
}

fn default_preset() -> EqPreset {
    EqPreset::Flat
}

fn default_command_capacity() -> usize {
    32
}

fn default_event_capacity() -> usize {
    256
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            repeat: RepeatMode::default(),
            shuffle: false,
            block_frames: default_block_frames(),
            position_update_ms: default_position_update_ms(),
        }
    }
}

impl Default for EqualizerSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            preset: default_preset(),
            bass_boost_db: None,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            command_capacity: default_command_capacity(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl EqualizerSettings {
    /// Equalizer state described by these settings
    pub fn to_eq_settings(&self) -> EqSettings {
        EqSettings {
            gains: self.preset.gains(),
            bass_boost_db: self
                .bass_boost_db
                .or(self.preset.bass_boost_db())
                .unwrap_or(0.0),
            enabled: self.enabled,
            preset: Some(self.preset),
        }
    }
}

impl PlayerConfig {
    /// Load configuration from file and environment
    ///
    /// With `path` the file must exist; without it `resonance.toml` (or any
    /// supported format) in the working directory is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, config::Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with(path: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut settings = config::Config::builder();

        settings = match path {
            Some(path) => settings.add_source(config::File::from(path).required(true)),
            None => settings.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        settings = settings.add_source(
            env.prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = settings
            .build()
            .map_err(|e| PlaybackError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| PlaybackError::Config(e.to_string()))?;

        config.validate()?;
        tracing::debug!(?config, "Configuration loaded");
        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.playback.volume > 100 {
            return Err(PlaybackError::precondition(format!(
                "volume {} outside 0-100",
                self.playback.volume
            )));
        }
        if self.playback.block_frames == 0 {
            return Err(PlaybackError::precondition("block_frames must be positive"));
        }
        if self.playback.position_update_ms == 0 {
            return Err(PlaybackError::precondition(
                "position_update_ms must be positive",
            ));
        }
        if let Some(boost) = self.equalizer.bass_boost_db {
            if !(0.0..=MAX_BASS_BOOST_DB).contains(&boost) {
                return Err(PlaybackError::precondition(format!(
                    "bass boost {boost} dB outside 0-{MAX_BASS_BOOST_DB}"
                )));
            }
        }
        if self.engine.command_capacity == 0 || self.engine.event_capacity == 0 {
            return Err(PlaybackError::precondition(
                "engine queue capacities must be positive",
            ));
        }
        self.spectrum.validate()?;
        Ok(())
    }
}
