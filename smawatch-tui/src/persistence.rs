//! App state persistence, JSON save/load across restarts.

use std::path::Path;

use serde::{Deserialize, Serialize};

use smawatch_core::classify::Thresholds;

use crate::app::AppState;

/// Serializable subset of app state that persists across restarts.
///
/// Bounds are not kept: they default to the freshly loaded data's range.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    /// Last thresholds set in the UI. `None` defers to the config file.
    pub thresholds: Option<Thresholds>,
    pub help_seen: bool,
}

/// Load persisted state from disk. Returns defaults if file is missing or corrupt.
pub fn load(path: &Path) -> PersistedState {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
        Err(_) => PersistedState::default(),
    }
}

/// Save persisted state to disk. Creates parent directories if needed.
pub fn save(path: &Path, state: &PersistedState) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(state)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn extract(app: &AppState) -> PersistedState {
    PersistedState {
        thresholds: Some(app.thresholds),
        help_seen: true,
    }
}

/// Apply persisted state. Invalid saved thresholds are ignored.
pub fn apply(app: &mut AppState, state: PersistedState) {
    if let Some(saved) = state.thresholds {
        match saved.validate() {
            Ok(()) => app.thresholds = saved,
            Err(e) => tracing::warn!("ignoring saved thresholds: {e}"),
        }
    }
    if !state.help_seen && app.screen == crate::app::Screen::Dashboard {
        app.overlay = crate::app::Overlay::Help;
    }
}
