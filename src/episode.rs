use std::path::PathBuf;

use anyhow::Context as _;

use crate::candidates::CandidateManager;
use crate::captions;
use crate::config::{ProjectLayout, RenderConfig, SeriesConfig};
use crate::formats::{CaptionMetadata, EpisodeManifest, OverlayPolicy};
use crate::overlay::{self, OverlayOptions};
use crate::selection;
use crate::transcode::Transcoder;

pub const AMBIENCE_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "aac", "ogg"];

const CANDIDATES_READY_NOTE: &str =
    "candidates generated; run `cutforge select` to write selections, then recompile\n";

/// Whether a compilation stops after candidate generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunMode {
    #[default]
    Normal,
    CandidatesOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EpisodeOutcome {
    Compiled {
        video_path: PathBuf,
        captions: CaptionMetadata,
    },
    CandidatesReady {
        marker: PathBuf,
    },
}

/// Load `episodes/<ep>/episode.yaml`. Episode and scene ids become path
/// segments under `output/`, so anything that could escape them is rejected.
pub fn load_manifest(layout: &ProjectLayout, episode_id: &str) -> anyhow::Result<EpisodeManifest> {
    check_path_segment("episode", episode_id)?;
    let path = layout.episode_manifest_path(episode_id);
    if !path.exists() {
        anyhow::bail!("episode manifest not found: {}", path.display());
    }
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("read episode manifest: {}", path.display()))?;
    let manifest: EpisodeManifest = serde_yaml::from_str(&raw)
        .with_context(|| format!("parse episode manifest: {}", path.display()))?;
    for scene in &manifest.scenes {
        check_path_segment("scene", &scene.id)
            .with_context(|| format!("episode manifest: {}", path.display()))?;
    }
    Ok(manifest)
}

fn check_path_segment(kind: &str, id: &str) -> anyhow::Result<()> {
    if id.is_empty() || id == "." || id.contains(['/', '\\']) || id.contains("..") {
        anyhow::bail!("invalid {kind} id '{id}': must not be empty or contain '/', '\\' or '..'");
    }
    Ok(())
}

/// First existing `<ambience_dir>/<name>.<ext>` over [`AMBIENCE_EXTENSIONS`].
pub fn resolve_ambience(
    layout: &ProjectLayout,
    series: &SeriesConfig,
    name: &str,
) -> Option<PathBuf> {
    let dir = layout.resolve(series.ambience_dir());
    let found = AMBIENCE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{name}.{ext}")))
        .find(|path| path.is_file());
    if found.is_none() {
        tracing::warn!(ambience = name, dir = %dir.display(), "ambience track not found; skipping");
    }
    found
}

pub struct EpisodeCompiler {
    pub layout: ProjectLayout,
    pub transcoder: Transcoder,
    pub candidates: CandidateManager,
    pub render: RenderConfig,
    pub series: SeriesConfig,
    pub overlays: OverlayPolicy,
    pub font_path: Option<String>,
    pub cut_id: String,
    pub mode: RunMode,
}

impl EpisodeCompiler {
    pub async fn compile(
        &self,
        episode_id: &str,
        manifest: &EpisodeManifest,
    ) -> anyhow::Result<EpisodeOutcome> {
        let cut_id = self.cut_id.as_str();
        let selections = match self.mode {
            RunMode::Normal => selection::load(&self.layout.selection_path(episode_id, cut_id)),
            RunMode::CandidatesOnly => None,
        };
        let overlay_options = OverlayOptions {
            font_path: self.font_path.clone(),
            density: self.overlays.density,
            theme: self.overlays.theme.clone(),
        };

        let mut scene_outputs = Vec::with_capacity(manifest.scenes.len());
        for scene in &manifest.scenes {
            let ledger = self
                .candidates
                .generate(cut_id, episode_id, scene, &self.render)
                .await
                .with_context(|| format!("scene {}", scene.id))?;

            if self.mode == RunMode::CandidatesOnly {
                continue;
            }

            let winner =
                selection::resolve_winner(selections.as_ref(), &scene.id, ledger.candidates.len());
            let chosen = self.layout.resolve(&ledger.candidates[winner - 1].path);
            tracing::info!(episode_id, scene_id = %scene.id, winner, "winner selected");

            let directives = if self.overlays.enabled {
                overlay::materialize(&self.layout, &scene.overlays)?
            } else {
                Vec::new()
            };

            if directives.is_empty() {
                scene_outputs.push(chosen);
                continue;
            }

            let overlaid = self
                .layout
                .scene_work_dir(cut_id, episode_id, &scene.id)
                .join(format!("{}_ov.mp4", scene.id));
            overlay::apply_overlays(
                &self.transcoder,
                &chosen,
                &directives,
                &overlaid,
                &self.render,
                &overlay_options,
            )
            .await
            .with_context(|| format!("apply overlays to scene {}", scene.id))?;
            scene_outputs.push(overlaid);
        }

        if self.mode == RunMode::CandidatesOnly {
            let marker = self.layout.candidates_marker_path(cut_id, episode_id);
            if let Some(parent) = marker.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create dir: {}", parent.display()))?;
            }
            std::fs::write(&marker, CANDIDATES_READY_NOTE)
                .with_context(|| format!("write marker: {}", marker.display()))?;
            tracing::info!(episode_id, marker = %marker.display(), "candidates ready for review");
            return Ok(EpisodeOutcome::CandidatesReady { marker });
        }

        let ambience = manifest
            .audio
            .ambience
            .as_deref()
            .and_then(|name| resolve_ambience(&self.layout, &self.series, name));
        if ambience.is_some() {
            tracing::debug!(
                episode_id,
                target_lufs = self.series.target_lufs(),
                "mixing ambience"
            );
        }

        let video_path = self.layout.episode_output_path(episode_id, cut_id);
        self.transcoder
            .concat(&scene_outputs, &video_path, &self.render, ambience.as_deref())
            .await
            .with_context(|| format!("concatenate episode {episode_id}"))?;

        let captions = captions::generate_episode_captions(&self.layout, episode_id, cut_id, manifest)
            .with_context(|| format!("captions for episode {episode_id}"))?;

        tracing::info!(episode_id, video = %video_path.display(), "episode compiled");
        Ok(EpisodeOutcome::Compiled {
            video_path,
            captions,
        })
    }
}
