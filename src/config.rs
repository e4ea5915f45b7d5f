use crate::game::life::HealthRules;
use crate::game::scores::ScoringRules;
use crate::game::timing_windows::TimingProfile;
use log::{info, warn};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

const CONFIG_PATH: &str = "tunnelsync.ini";

pub const DEFAULT_REWIND_THRESHOLD_MS: f64 = 250.0;

// --- Minimal INI reader ---
#[derive(Debug, Default)]
pub struct SimpleIni {
    sections: HashMap<String, HashMap<String, String>>,
}

impl SimpleIni {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<(), std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        self.load_str(&content);
        Ok(())
    }

    pub fn load_str(&mut self, content: &str) {
        self.sections.clear();
        let mut current_section: Option<String> = None;

        for raw_line in content.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            // Section header: [SectionName]
            if line.starts_with('[') && line.ends_with(']') && line.len() >= 2 {
                let section = line[1..line.len() - 1].trim().to_string();
                current_section = Some(section.clone());
                self.sections.entry(section).or_default();
                continue;
            }

            if let Some((key_raw, value_raw)) = line.split_once('=') {
                let key = key_raw.trim();
                if key.is_empty() {
                    continue;
                }
                let section = current_section.clone().unwrap_or_default();
                self.sections
                    .entry(section)
                    .or_default()
                    .insert(key.to_string(), value_raw.trim().to_string());
            }
        }
    }

    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        self.sections.get(section).and_then(|s| s.get(key)).cloned()
    }

    fn get_parsed<T: FromStr>(&self, section: &str, key: &str) -> Option<T> {
        let raw = self.get(section, key)?;
        match raw.parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid value '{raw}' for [{section}] {key}.");
                None
            }
        }
    }

    fn get_bool(&self, section: &str, key: &str) -> Option<bool> {
        let v = self.get(section, key)?;
        let v = v.trim();
        if v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes") || v.eq_ignore_ascii_case("on") {
            Some(true)
        } else if v.eq_ignore_ascii_case("false") || v.eq_ignore_ascii_case("no") || v.eq_ignore_ascii_case("off") {
            Some(false)
        } else {
            v.parse::<u8>().ok().map(|n| n != 0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }

    pub const fn as_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Off,
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    pub log_level: LogLevel,
    /// Log data defects and invariant violations instead of dropping them.
    pub diagnostics: bool,
    // A tick this far behind the previous one restarts the session.
    pub rewind_threshold_ms: f64,
    pub timing: TimingProfile,
    pub scoring: ScoringRules,
    pub health: HealthRules,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            diagnostics: true,
            rewind_threshold_ms: DEFAULT_REWIND_THRESHOLD_MS,
            timing: TimingProfile::default(),
            scoring: ScoringRules::default(),
            health: HealthRules::default(),
        }
    }
}

impl Config {
    /// Reads every known key, keeping the default for anything missing or
    /// malformed.
    pub fn from_ini(conf: &SimpleIni) -> Self {
        let d = Self::default();
        let t = d.timing;
        let s = d.scoring;
        let h = d.health;
        let ms = |section: &str, key: &str, fallback: f64| {
            conf.get_parsed::<f64>(section, key)
                .filter(|v| v.is_finite())
                .unwrap_or(fallback)
        };
        let points = |key: &str, fallback: u64| conf.get_parsed::<u64>("Scoring", key).unwrap_or(fallback);
        let penalty = |key: &str, fallback: i32| conf.get_parsed::<i32>("Health", key).unwrap_or(fallback);

        Self {
            log_level: conf
                .get("Options", "LogLevel")
                .and_then(|v| LogLevel::from_str(&v).ok())
                .unwrap_or(d.log_level),
            diagnostics: conf.get_bool("Options", "Diagnostics").unwrap_or(d.diagnostics),
            rewind_threshold_ms: ms("Options", "RewindThresholdMs", d.rewind_threshold_ms).max(0.0),
            timing: TimingProfile {
                lead_time_ms: ms("Timing", "LeadTimeMs", t.lead_time_ms),
                tap_early_window_ms: ms("Timing", "TapEarlyWindowMs", t.tap_early_window_ms),
                tap_hit_window_ms: ms("Timing", "TapHitWindowMs", t.tap_hit_window_ms),
                tap_failure_buffer_ms: ms("Timing", "TapFailureBufferMs", t.tap_failure_buffer_ms),
                too_early_window_ms: ms("Timing", "TooEarlyWindowMs", t.too_early_window_ms),
                hold_activation_window_ms: ms(
                    "Timing",
                    "HoldActivationWindowMs",
                    t.hold_activation_window_ms,
                ),
                hold_release_window_ms: ms("Timing", "HoldReleaseWindowMs", t.hold_release_window_ms),
                hold_miss_timeout_ms: ms("Timing", "HoldMissTimeoutMs", t.hold_miss_timeout_ms),
                hold_animation_duration_ms: ms(
                    "Timing",
                    "HoldAnimationDurationMs",
                    t.hold_animation_duration_ms,
                ),
                tier_windows_ms: [
                    ms("Timing", "PerfectWindowMs", t.tier_windows_ms[0]),
                    ms("Timing", "GreatWindowMs", t.tier_windows_ms[1]),
                ],
                rotation_trigger_advance_ms: ms(
                    "Rotation",
                    "TriggerAdvanceMs",
                    t.rotation_trigger_advance_ms,
                ),
                rotation_duration_ms: ms("Rotation", "DurationMs", t.rotation_duration_ms),
            },
            scoring: ScoringRules {
                tier_points: [
                    points("PerfectPoints", s.tier_points[0]),
                    points("GreatPoints", s.tier_points[1]),
                    points("NormalPoints", s.tier_points[2]),
                ],
                hold_completion_points: points("HoldCompletionPoints", s.hold_completion_points),
            },
            health: HealthRules {
                max_health: penalty("MaxHealth", h.max_health).max(1),
                tap_miss: penalty("TapMissPenalty", h.tap_miss),
                tap_too_early: penalty("TapTooEarlyPenalty", h.tap_too_early),
                hold_too_early: penalty("HoldTooEarlyPenalty", h.hold_too_early),
                hold_timeout: penalty("HoldTimeoutPenalty", h.hold_timeout),
                hold_release: penalty("HoldReleasePenalty", h.hold_release),
                hold_skip: penalty("HoldSkipPenalty", h.hold_skip),
            },
        }
    }

    /// Engine timing with inconsistent windows repaired.
    pub fn timing_profile(&self) -> TimingProfile {
        self.timing.sanitized()
    }

    pub fn to_ini_string(&self) -> String {
        let t = &self.timing;
        let s = &self.scoring;
        let h = &self.health;
        let mut content = String::new();

        content.push_str("[Options]\n");
        content.push_str(&format!(
            "Diagnostics={}\n",
            if self.diagnostics { "1" } else { "0" }
        ));
        content.push_str(&format!("LogLevel={}\n", self.log_level.as_str()));
        content.push_str(&format!("RewindThresholdMs={}\n", self.rewind_threshold_ms));
        content.push('\n');

        content.push_str("[Timing]\n");
        content.push_str(&format!("GreatWindowMs={}\n", t.tier_windows_ms[1]));
        content.push_str(&format!("HoldActivationWindowMs={}\n", t.hold_activation_window_ms));
        content.push_str(&format!("HoldAnimationDurationMs={}\n", t.hold_animation_duration_ms));
        content.push_str(&format!("HoldMissTimeoutMs={}\n", t.hold_miss_timeout_ms));
        content.push_str(&format!("HoldReleaseWindowMs={}\n", t.hold_release_window_ms));
        content.push_str(&format!("LeadTimeMs={}\n", t.lead_time_ms));
        content.push_str(&format!("PerfectWindowMs={}\n", t.tier_windows_ms[0]));
        content.push_str(&format!("TapEarlyWindowMs={}\n", t.tap_early_window_ms));
        content.push_str(&format!("TapFailureBufferMs={}\n", t.tap_failure_buffer_ms));
        content.push_str(&format!("TapHitWindowMs={}\n", t.tap_hit_window_ms));
        content.push_str(&format!("TooEarlyWindowMs={}\n", t.too_early_window_ms));
        content.push('\n');

        content.push_str("[Scoring]\n");
        content.push_str(&format!("GreatPoints={}\n", s.tier_points[1]));
        content.push_str(&format!("HoldCompletionPoints={}\n", s.hold_completion_points));
        content.push_str(&format!("NormalPoints={}\n", s.tier_points[2]));
        content.push_str(&format!("PerfectPoints={}\n", s.tier_points[0]));
        content.push('\n');

        content.push_str("[Health]\n");
        content.push_str(&format!("HoldReleasePenalty={}\n", h.hold_release));
        content.push_str(&format!("HoldSkipPenalty={}\n", h.hold_skip));
        content.push_str(&format!("HoldTimeoutPenalty={}\n", h.hold_timeout));
        content.push_str(&format!("HoldTooEarlyPenalty={}\n", h.hold_too_early));
        content.push_str(&format!("MaxHealth={}\n", h.max_health));
        content.push_str(&format!("TapMissPenalty={}\n", h.tap_miss));
        content.push_str(&format!("TapTooEarlyPenalty={}\n", h.tap_too_early));
        content.push('\n');

        content.push_str("[Rotation]\n");
        content.push_str(&format!("DurationMs={}\n", t.rotation_duration_ms));
        content.push_str(&format!("TriggerAdvanceMs={}\n", t.rotation_trigger_advance_ms));
        content.push('\n');

        content
    }
}

// Global, mutable configuration instance.
static CONFIG: std::sync::LazyLock<Mutex<Config>> =
    std::sync::LazyLock::new(|| Mutex::new(Config::default()));

// --- File I/O ---

fn create_default_config_file() -> Result<(), std::io::Error> {
    info!("'{CONFIG_PATH}' not found, creating with default values.");
    std::fs::write(CONFIG_PATH, Config::default().to_ini_string())
}

pub fn load() {
    if !Path::new(CONFIG_PATH).exists()
        && let Err(e) = create_default_config_file()
    {
        warn!("Failed to create default config file: {e}");
    }

    let mut conf = SimpleIni::new();
    match conf.load(CONFIG_PATH) {
        Ok(()) => {
            let loaded = Config::from_ini(&conf);
            *CONFIG.lock().unwrap_or_else(PoisonError::into_inner) = loaded;
            info!("Configuration loaded from '{CONFIG_PATH}'.");
        }
        Err(e) => warn!("Failed to load '{CONFIG_PATH}': {e}. Using default values."),
    }
}

pub fn get() -> Config {
    *CONFIG.lock().unwrap_or_else(PoisonError::into_inner)
}
