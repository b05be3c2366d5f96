use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;

use super::{Provider, placeholder_clip, scene_output_path};
use crate::config::{ProjectLayout, RenderConfig};
use crate::formats::Scene;
use crate::transcode::Transcoder;

/// Copies hand-rendered clips from `renders/final` (then `renders/drafts`);
/// emits a placeholder when neither exists.
#[derive(Debug, Clone)]
pub struct PrebakedProvider {
    layout: ProjectLayout,
    transcoder: Transcoder,
}

impl PrebakedProvider {
    pub fn new(layout: ProjectLayout, transcoder: Transcoder) -> Self {
        Self { layout, transcoder }
    }

    fn lookup(&self, episode_id: &str, scene_id: &str) -> Option<PathBuf> {
        let renders = self.layout.renders_dir(episode_id);
        ["final", "drafts"]
            .into_iter()
            .map(|stage| renders.join(stage).join(format!("{scene_id}.mp4")))
            .find(|path| path.is_file())
    }
}

#[async_trait]
impl Provider for PrebakedProvider {
    fn name(&self) -> &'static str {
        "prebaked"
    }

    async fn generate_scene(
        &self,
        episode_id: &str,
        scene: &Scene,
        output_dir: &Path,
        render: &RenderConfig,
        _seed: Option<i64>,
    ) -> anyhow::Result<PathBuf> {
        let out_path = scene_output_path(output_dir, scene)?;

        if let Some(source) = self.lookup(episode_id, &scene.id) {
            tokio::fs::copy(&source, &out_path).await.with_context(|| {
                format!("copy {} -> {}", source.display(), out_path.display())
            })?;
            tracing::debug!(episode_id, scene_id = %scene.id, source = %source.display(), "prebaked clip copied");
            return Ok(out_path);
        }

        tracing::info!(episode_id, scene_id = %scene.id, "no prebaked clip; using placeholder");
        placeholder_clip(&self.transcoder, &out_path, render, scene.duration_or(1.0)).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::provider::test_support::{fake_transcoder, render, scene};

    #[tokio::test]
    async fn prefers_final_then_drafts_then_placeholder() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let layout = ProjectLayout::new(dir.path().join("proj"));
        let provider = PrebakedProvider::new(layout.clone(), fake_transcoder(dir.path())?);

        let renders = layout.renders_dir("ep1");
        std::fs::create_dir_all(renders.join("final"))?;
        std::fs::create_dir_all(renders.join("drafts"))?;
        std::fs::write(renders.join("final").join("s1.mp4"), b"final-s1")?;
        std::fs::write(renders.join("drafts").join("s1.mp4"), b"draft-s1")?;
        std::fs::write(renders.join("drafts").join("s2.mp4"), b"draft-s2")?;

        let out = dir.path().join("out");
        let s1 = provider
            .generate_scene("ep1", &scene("id: s1\n"), &out, &render(), None)
            .await?;
        assert_eq!(std::fs::read(&s1)?, b"final-s1");

        let s2 = provider
            .generate_scene("ep1", &scene("id: s2\n"), &out, &render(), None)
            .await?;
        assert_eq!(std::fs::read(&s2)?, b"draft-s2");

        let s3 = provider
            .generate_scene("ep1", &scene("id: s3\n"), &out, &render(), None)
            .await?;
        let args = std::fs::read_to_string(&s3)?;
        assert!(args.contains("color=0x202833"), "{args}");
        Ok(())
    }
}
