use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// PilotConfig: file-based config loader (apply-pilot.json) with env-var fallback
// ---------------------------------------------------------------------------

/// Top-level config loaded from `apply-pilot.json`.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct PilotConfig {
    /// Explicit Chromium-family executable path. Empty/absent → auto-discovery.
    pub chrome_executable: Option<String>,
    /// Run the browser headless. Default: `true`.
    pub headless: Option<bool>,
    /// Directory for screenshot output. Default: `~/.apply-pilot/screenshots`.
    pub screenshot_dir: Option<String>,
    /// Default inter-job delay bounds (seconds) when neither the board
    /// profile nor the batch settings specify one.
    pub delay_min_seconds: Option<u64>,
    pub delay_max_seconds: Option<u64>,
    /// Quiet window for the network-idle settle heuristic (ms). Default: 1500.
    pub settle_quiet_ms: Option<u64>,
    /// Hard ceiling for the settle wait (ms). Default: 8000.
    pub settle_timeout_ms: Option<u64>,
}

impl PilotConfig {
    /// Chrome executable: JSON field → `CHROME_EXECUTABLE` env var → `None`
    /// (auto-discovery). Only returns a value for an existing path.
    pub fn resolve_chrome_executable(&self) -> Option<String> {
        let candidate = self
            .chrome_executable
            .clone()
            .filter(|p| !p.trim().is_empty())
            .or_else(|| std::env::var(ENV_CHROME_EXECUTABLE).ok());
        candidate.filter(|p| Path::new(p.trim()).exists())
    }

    /// Headless toggle: JSON field → `APPLY_PILOT_HEADFUL` env var (set to
    /// "1" to run headful) → `true`.
    pub fn resolve_headless(&self) -> bool {
        if let Some(b) = self.headless {
            return b;
        }
        !matches!(
            std::env::var(ENV_HEADFUL).as_deref(),
            Ok("1") | Ok("true") | Ok("yes")
        )
    }

    /// Screenshot directory: JSON field → `APPLY_PILOT_SCREENSHOT_DIR` env
    /// var → `~/.apply-pilot/screenshots` → `{TMPDIR}/apply-pilot-screenshots`.
    pub fn resolve_screenshot_dir(&self) -> PathBuf {
        if let Some(d) = self.screenshot_dir.as_ref().filter(|d| !d.trim().is_empty()) {
            return PathBuf::from(d);
        }
        if let Ok(d) = std::env::var(ENV_SCREENSHOT_DIR) {
            if !d.trim().is_empty() {
                return PathBuf::from(d);
            }
        }
        match dirs::home_dir() {
            Some(home) => home.join(".apply-pilot").join("screenshots"),
            None => std::env::temp_dir().join("apply-pilot-screenshots"),
        }
    }

    pub fn resolve_delay_min_seconds(&self) -> u64 {
        self.delay_min_seconds.unwrap_or(30)
    }

    pub fn resolve_delay_max_seconds(&self) -> u64 {
        self.delay_max_seconds.unwrap_or(120)
    }

    pub fn resolve_settle_quiet_ms(&self) -> u64 {
        self.settle_quiet_ms.unwrap_or(1500)
    }

    pub fn resolve_settle_timeout_ms(&self) -> u64 {
        self.settle_timeout_ms.unwrap_or(8000)
    }
}

pub const ENV_CHROME_EXECUTABLE: &str = "CHROME_EXECUTABLE";
pub const ENV_HEADFUL: &str = "APPLY_PILOT_HEADFUL";
pub const ENV_SCREENSHOT_DIR: &str = "APPLY_PILOT_SCREENSHOT_DIR";
pub const ENV_CONFIG_PATH: &str = "APPLY_PILOT_CONFIG";

/// Load `apply-pilot.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `APPLY_PILOT_CONFIG` env var path
/// 2. `./apply-pilot.json` (process cwd)
/// 3. `../apply-pilot.json` (one level up)
///
/// Missing file → `PilotConfig::default()` (silent, all env-var fallbacks
/// apply). Parse error → log a warning, return `PilotConfig::default()`.
pub fn load_pilot_config() -> PilotConfig {
    let candidates: Vec<PathBuf> = {
        let mut v = vec![
            PathBuf::from("apply-pilot.json"),
            PathBuf::from("../apply-pilot.json"),
        ];
        if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
            v.insert(0, PathBuf::from(env_path));
        }
        v
    };

    for path in &candidates {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<PilotConfig>(&contents) {
                Ok(cfg) => {
                    tracing::info!("apply-pilot.json loaded from {}", path.display());
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!(
                        "apply-pilot.json parse error at {}: {} — using defaults",
                        path.display(),
                        e
                    );
                    return PilotConfig::default();
                }
            },
            Err(_) => continue, // file not found at this path, try next
        }
    }

    PilotConfig::default()
}
