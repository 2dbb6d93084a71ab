use anyhow::{Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "tamagotchia")]
#[command(about = "Terminal virtual pet that chats through a text-generation service")]
pub(crate) struct Cli {
    /// Base URL of the chat service (serves /api/chat and /api/status)
    #[arg(long)]
    pub(crate) endpoint: Option<String>,

    /// Frame rate cap
    #[arg(long)]
    pub(crate) fps: Option<u32>,

    /// RNG seed for the ball mini-game (0 = random)
    #[arg(long)]
    pub(crate) seed: Option<u64>,

    /// Do not contact the chat service; every reply is the fallback
    #[arg(long, default_value_t = false)]
    pub(crate) offline: bool,

    /// Start from default stats instead of the saved ones
    #[arg(long, default_value_t = false)]
    pub(crate) reset: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    pub(crate) fps_cap: u32,
    pub(crate) decay_interval_ms: u64,
    pub(crate) frame_interval_ms: u64,
    pub(crate) chat_endpoint: String,
    pub(crate) chat_timeout_secs: u64,
    pub(crate) enable_color: bool,
    pub(crate) seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fps_cap: 30,
            decay_interval_ms: 5000,
            frame_interval_ms: 500,
            chat_endpoint: "http://127.0.0.1:5000".to_string(),
            chat_timeout_secs: 30,
            enable_color: true,
            seed: 0,
        }
    }
}

impl Settings {
    /// Command-line values win for this session.
    pub(crate) fn merge_cli(&mut self, cli: &Cli) {
        if let Some(e) = &cli.endpoint {
            self.chat_endpoint = e.clone();
        }
        if let Some(fps) = cli.fps {
            self.fps_cap = fps;
        }
        if let Some(seed) = cli.seed {
            self.seed = seed;
        }
    }

    pub(crate) fn effective_seed(&self) -> u64 {
        if self.seed == 0 {
            rand::random()
        } else {
            self.seed
        }
    }
}

pub(crate) struct Paths {
    pub(crate) save_path: PathBuf,
    pub(crate) settings_path: PathBuf,
    pub(crate) log_path: PathBuf,
}

impl Paths {
    pub(crate) fn in_dir(dir: &Path) -> Self {
        Self {
            save_path: dir.join("tamagotchi_state.json"),
            settings_path: dir.join("settings.json"),
            log_path: dir.join("tamagotchia.log"),
        }
    }
}

pub(crate) fn project_paths() -> Result<Paths> {
    let proj = ProjectDirs::from("com", "tamagotchia", "TamagotchIA")
        .context("could not resolve project directories")?;
    let dir = proj.data_local_dir();
    fs::create_dir_all(dir).ok();
    Ok(Paths::in_dir(dir))
}

/// Used when the platform data directory cannot be resolved.
pub(crate) fn fallback_paths() -> Paths {
    let dir = std::env::temp_dir().join("tamagotchia");
    fs::create_dir_all(&dir).ok();
    Paths::in_dir(&dir)
}

pub(crate) fn load_settings(path: &Path) -> Settings {
    if let Ok(s) = fs::read_to_string(path) {
        if let Ok(v) = serde_json::from_str::<Settings>(&s) {
            return v;
        }
    }
    Settings::default()
}

pub(crate) fn save_settings_atomic(path: &Path, s: &Settings) -> Result<()> {
    write_json_atomic(path, s)
}

/// Persist settings, logging instead of failing. Returns whether the write landed.
pub(crate) fn store_settings(path: &Path, s: &Settings) -> bool {
    match save_settings_atomic(path, s) {
        Ok(()) => true,
        Err(e) => {
            warn!("could not save settings: {e:#}");
            false
        }
    }
}

pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(value)?;
    fs::write(&tmp, data).with_context(|| format!("writing {}", tmp.display()))?;
    atomic_rename(&tmp, path)?;
    Ok(())
}

pub(crate) fn atomic_rename(from: &Path, to: &Path) -> Result<()> {
    // Windows refuses to rename over an existing file.
    if to.exists() {
        let _ = fs::remove_file(to);
    }
    fs::rename(from, to)?;
    Ok(())
}
