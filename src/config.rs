use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::{seam_debug, Error, Result};

/// Tunables for the gap detector.
///
/// The defaults are the calibrated production values; they are knobs,
/// not invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Effort delta between adjacent tasks (hours) above which the
    /// time_gap indicator fires. A jump of more than roughly one
    /// work-week suggests missing intermediate effort.
    #[serde(default = "default_time_gap_hours")]
    pub time_gap_hours: f32,
    /// Minimum ordinal distance between action phases for the
    /// action_type_jump indicator.
    #[serde(default = "default_phase_jump")]
    pub phase_jump: u8,
    /// Number of indicators (out of 4) required to promote a pair to a
    /// gap. The conservative default bounds the false-positive rate.
    #[serde(default = "default_min_indicators")]
    pub min_indicators: u8,
    /// Gaps surfaced per analysis, highest confidence first.
    #[serde(default = "default_max_gaps")]
    pub max_gaps: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            time_gap_hours: default_time_gap_hours(),
            phase_jump: default_phase_jump(),
            min_indicators: default_min_indicators(),
            max_gaps: default_max_gaps(),
        }
    }
}

fn default_time_gap_hours() -> f32 {
    40.0
}

fn default_phase_jump() -> u8 {
    2
}

fn default_min_indicators() -> u8 {
    3
}

fn default_max_gaps() -> usize {
    3
}

/// Tunables for the candidate pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Candidates whose maximum similarity to an existing task exceeds
    /// this are dropped as duplicates.
    #[serde(default = "default_dedup_threshold")]
    pub dedup_threshold: f64,
    /// Composite confidence weight for similarity to historical tasks.
    #[serde(default = "default_weight_history")]
    pub weight_history: f64,
    /// Composite confidence weight for gap confidence.
    #[serde(default = "default_weight_gap")]
    pub weight_gap: f64,
    /// Composite confidence weight for provider-reported confidence.
    #[serde(default = "default_weight_provider")]
    pub weight_provider: f64,
    /// Candidates kept per gap, highest composite confidence first.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Historical tasks fetched to anchor granularity and tone.
    #[serde(default = "default_anchor_k")]
    pub anchor_k: usize,
    /// Per-gap budget for the external generation call.
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,
    /// Gaps analyzed concurrently within one session.
    #[serde(default = "default_max_parallel_gaps")]
    pub max_parallel_gaps: usize,
}

impl PipelineConfig {
    /// Generation timeout as a `Duration`.
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dedup_threshold: default_dedup_threshold(),
            weight_history: default_weight_history(),
            weight_gap: default_weight_gap(),
            weight_provider: default_weight_provider(),
            max_candidates: default_max_candidates(),
            anchor_k: default_anchor_k(),
            generation_timeout_secs: default_generation_timeout_secs(),
            max_parallel_gaps: default_max_parallel_gaps(),
        }
    }
}

fn default_dedup_threshold() -> f64 {
    0.90
}

fn default_weight_history() -> f64 {
    0.4
}

fn default_weight_gap() -> f64 {
    0.3
}

fn default_weight_provider() -> f64 {
    0.3
}

fn default_max_candidates() -> usize {
    3
}

fn default_anchor_k() -> usize {
    10
}

fn default_generation_timeout_secs() -> u64 {
    5
}

fn default_max_parallel_gaps() -> usize {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Config {
    pub fn seam_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".seam"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::seam_dir()?.join("seam.toml"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        seam_debug!("Config::load path={}", path.display());
        if !path.exists() {
            seam_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(&path)?)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let seam_dir = Self::seam_dir()?;
        if !seam_dir.exists() {
            fs::create_dir_all(&seam_dir)?;
        }
        fs::write(Self::config_path()?, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}
