use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest as _, Sha256};

use super::{Provider, scene_output_path};
use crate::config::RenderConfig;
use crate::formats::Scene;
use crate::transcode::Transcoder;

/// Synthetic provider: a solid clip whose colour is derived from
/// `episode:scene:seed`, so identical inputs give identical clips.
#[derive(Debug, Clone)]
pub struct DummyProvider {
    transcoder: Transcoder,
}

impl DummyProvider {
    pub fn new(transcoder: Transcoder) -> Self {
        Self { transcoder }
    }
}

pub fn color_for(episode_id: &str, scene_id: &str, seed: Option<i64>) -> String {
    let key = format!("{episode_id}:{scene_id}:{}", seed.unwrap_or(0));
    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    format!("0x{}", &digest[..6])
}

#[async_trait]
impl Provider for DummyProvider {
    fn name(&self) -> &'static str {
        "dummy"
    }

    async fn generate_scene(
        &self,
        episode_id: &str,
        scene: &Scene,
        output_dir: &Path,
        render: &RenderConfig,
        seed: Option<i64>,
    ) -> anyhow::Result<PathBuf> {
        let out_path = scene_output_path(output_dir, scene)?;
        let color = color_for(episode_id, &scene.id, seed);
        let duration = scene.duration_or(1.0);

        self.transcoder
            .solid_color_clip(&out_path, render, &color, duration)
            .await?;
        tracing::debug!(
            episode_id,
            scene_id = %scene.id,
            ?seed,
            color = %color,
            "dummy scene generated"
        );
        Ok(out_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_is_stable_and_seed_salted() {
        let a = color_for("ep1", "s1", Some(1));
        assert_eq!(a, color_for("ep1", "s1", Some(1)));
        assert_eq!(a.len(), 8);
        assert!(a.starts_with("0x"));
        assert!(a[2..].bytes().all(|b| b.is_ascii_hexdigit()));

        assert_ne!(a, color_for("ep1", "s1", Some(2)));
        assert_ne!(a, color_for("ep2", "s1", Some(1)));
        assert_eq!(color_for("ep1", "s1", None), color_for("ep1", "s1", Some(0)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn writes_clip_named_after_scene() -> anyhow::Result<()> {
        use crate::provider::test_support::{fake_transcoder, render, scene};

        let dir = tempfile::tempdir()?;
        let provider = DummyProvider::new(fake_transcoder(dir.path())?);
        let out_dir = dir.path().join("cand1");

        let path = provider
            .generate_scene("ep1", &scene("id: s1\nduration_sec: 2\n"), &out_dir, &render(), Some(7))
            .await?;

        assert_eq!(path, out_dir.join("s1.mp4"));
        let args = std::fs::read_to_string(&path)?;
        assert!(args.contains(&format!("color={}", color_for("ep1", "s1", Some(7)))), "{args}");
        assert!(args.contains("-t 2 "), "{args}");
        assert!(args.contains("size=320x240:rate=24"), "{args}");
        Ok(())
    }
}
