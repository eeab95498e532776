use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::codec::DecodeConfig;

pub const DEFAULT_SECTION_WIDTH: f32 = 100.0;

/// Horizontal speed of the simulated player at the default speed setting,
/// in world units per second.
pub const DEFAULT_PLAYER_SPEED: f32 = 311.58;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub section_width: f32,
    pub decode: DecodeConfig,
    pub sources: SourceLayout,
    pub edit_queue_capacity: usize,
    pub simulation: SimulationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            section_width: DEFAULT_SECTION_WIDTH,
            decode: DecodeConfig::default(),
            sources: SourceLayout::default(),
            edit_queue_capacity: 256,
            simulation: SimulationConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Section width actually used by the index; non-positive or non-finite
    /// widths fall back to the default.
    pub fn effective_section_width(&self) -> f32 {
        if self.section_width.is_finite() && self.section_width > 0.0 {
            self.section_width
        } else {
            DEFAULT_SECTION_WIDTH
        }
    }
}

/// Where level payloads live, relative to the storage root.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SourceLayout {
    pub archive_path: PathBuf,
    pub levels_dir: PathBuf,
    pub level_extension: String,
    pub plist_extension: String,
}

impl Default for SourceLayout {
    fn default() -> Self {
        Self {
            archive_path: PathBuf::from("Custom").join("mainLevels.json"),
            levels_dir: PathBuf::from("levels"),
            level_extension: "txt".to_string(),
            plist_extension: "gmd".to_string(),
        }
    }
}

impl SourceLayout {
    pub fn level_file(&self, level_id: i64) -> PathBuf {
        self.levels_dir
            .join(format!("{level_id}.{}", self.level_extension))
    }

    pub fn plist_file(&self, level_id: i64) -> PathBuf {
        self.levels_dir
            .join(format!("{level_id}.{}", self.plist_extension))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub target_tps: u32,
    pub max_ticks_per_frame: u32,
    pub max_frame_delta_ms: u64,
    pub player_speed: f32,
    pub metrics_log_interval_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_ticks_per_frame: 5,
            max_frame_delta_ms: 250,
            player_speed: DEFAULT_PLAYER_SPEED,
            metrics_log_interval_ms: 1000,
        }
    }
}

impl SimulationConfig {
    pub fn fixed_dt(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.target_tps.max(1)))
    }

    pub fn max_frame_delta(&self) -> Duration {
        Duration::from_millis(self.max_frame_delta_ms.max(1))
    }

    pub fn metrics_log_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_log_interval_ms.max(1))
    }
}
