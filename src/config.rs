use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

use crate::formats::RenderParams;

pub const DEFAULT_FPS: u32 = 24;
pub const DEFAULT_RESOLUTION: &str = "1080x1920";
pub const DEFAULT_ASPECT: &str = "9:16";
pub const DEFAULT_AMBIENCE_DIR: &str = "assets/audio/ambience";
pub const DEFAULT_TARGET_LUFS: f64 = -18.0;

/// Filesystem layout of a series project. Every path the compiler reads or
/// writes is derived here.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn series_config_path(&self) -> PathBuf {
        self.root.join("config").join("series.yaml")
    }

    pub fn episode_dir(&self, episode_id: &str) -> PathBuf {
        self.root.join("episodes").join(episode_id)
    }

    pub fn episode_manifest_path(&self, episode_id: &str) -> PathBuf {
        self.episode_dir(episode_id).join("episode.yaml")
    }

    pub fn renders_dir(&self, episode_id: &str) -> PathBuf {
        self.episode_dir(episode_id).join("renders")
    }

    pub fn selection_path(&self, episode_id: &str, cut_id: &str) -> PathBuf {
        self.renders_dir(episode_id)
            .join("selections")
            .join(format!("{cut_id}.yaml"))
    }

    pub fn overlay_template_path(&self, name: &str) -> PathBuf {
        self.root
            .join("assets")
            .join("templates")
            .join("overlays")
            .join(format!("{name}.json"))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    pub fn candidates_root(&self, cut_id: &str) -> PathBuf {
        self.output_dir().join("tmp").join(cut_id)
    }

    pub fn episode_work_dir(&self, cut_id: &str, episode_id: &str) -> PathBuf {
        self.candidates_root(cut_id).join(episode_id)
    }

    pub fn scene_work_dir(&self, cut_id: &str, episode_id: &str, scene_id: &str) -> PathBuf {
        self.episode_work_dir(cut_id, episode_id).join(scene_id)
    }

    pub fn candidate_dir(
        &self,
        cut_id: &str,
        episode_id: &str,
        scene_id: &str,
        index: usize,
    ) -> PathBuf {
        self.scene_work_dir(cut_id, episode_id, scene_id)
            .join(format!("cand{index}"))
    }

    pub fn ledger_path(&self, cut_id: &str, episode_id: &str, scene_id: &str) -> PathBuf {
        self.scene_work_dir(cut_id, episode_id, scene_id)
            .join("candidates.json")
    }

    pub fn candidates_marker_path(&self, cut_id: &str, episode_id: &str) -> PathBuf {
        self.episode_work_dir(cut_id, episode_id)
            .join("_candidates_ready.txt")
    }

    pub fn episode_output_dir(&self, episode_id: &str) -> PathBuf {
        self.output_dir().join("episodes").join(episode_id)
    }

    pub fn episode_output_path(&self, episode_id: &str, cut_id: &str) -> PathBuf {
        self.episode_output_dir(episode_id)
            .join(format!("{episode_id}__{cut_id}.mp4"))
    }

    pub fn cut_dir(&self, cut_id: &str) -> PathBuf {
        self.output_dir().join("cuts").join(cut_id)
    }

    pub fn cut_manifest_path(&self, cut_id: &str) -> PathBuf {
        self.cut_dir(cut_id).join("manifest").join("cut.manifest.json")
    }

    pub fn review_sheet_path(&self, cut_id: &str) -> PathBuf {
        self.cut_dir(cut_id).join("review.html")
    }

    /// `path` relative to the project root, `/`-separated, for manifests.
    pub fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn resolve(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }
}

/// Series-level defaults (`config/series.yaml`). Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeriesConfig {
    #[serde(default, deserialize_with = "crate::formats::whole_fps")]
    pub fps: Option<u32>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub aspect: Option<String>,
    #[serde(default)]
    pub audio: SeriesAudio,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeriesAudio {
    #[serde(default)]
    pub ambience_dir: Option<String>,
    #[serde(default)]
    pub target_lufs: Option<f64>,
}

impl SeriesConfig {
    pub fn load(layout: &ProjectLayout) -> anyhow::Result<Self> {
        let path = layout.series_config_path();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no series config; using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("read series config: {}", path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&raw)
            .with_context(|| format!("parse series config: {}", path.display()))
    }

    pub fn ambience_dir(&self) -> &str {
        self.audio
            .ambience_dir
            .as_deref()
            .unwrap_or(DEFAULT_AMBIENCE_DIR)
    }

    pub fn target_lufs(&self) -> f64 {
        self.audio.target_lufs.unwrap_or(DEFAULT_TARGET_LUFS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub aspect: String,
    pub resolution: String,
}

impl RenderConfig {
    pub fn from_strings(resolution: &str, fps: u32, aspect: &str) -> anyhow::Result<Self> {
        let (width, height) = parse_resolution(resolution)?;
        if fps == 0 {
            anyhow::bail!("invalid fps '{fps}': must be > 0");
        }
        Ok(Self {
            width,
            height,
            fps,
            aspect: aspect.to_owned(),
            resolution: resolution.to_owned(),
        })
    }

    /// Recipe values win; series config fills gaps; built-in defaults last.
    pub fn resolve(render: &RenderParams, series: &SeriesConfig) -> anyhow::Result<Self> {
        let fps = render.fps.or(series.fps).unwrap_or(DEFAULT_FPS);
        let resolution = render
            .resolution
            .as_deref()
            .or(series.resolution.as_deref())
            .unwrap_or(DEFAULT_RESOLUTION);
        let aspect = render
            .aspect
            .as_deref()
            .or(series.aspect.as_deref())
            .unwrap_or(DEFAULT_ASPECT);
        Self::from_strings(resolution, fps, aspect).context("resolve render config")
    }

    pub fn size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

fn parse_resolution(resolution: &str) -> anyhow::Result<(u32, u32)> {
    let invalid = || {
        anyhow::anyhow!("invalid resolution '{resolution}': expected WIDTHxHEIGHT, e.g. 1080x1920")
    };

    let (w, h) = resolution.split_once('x').ok_or_else(invalid)?;
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(w) || !all_digits(h) {
        return Err(invalid());
    }

    let width: u32 = w.parse().map_err(|_| invalid())?;
    let height: u32 = h.parse().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok((width, height))
}
