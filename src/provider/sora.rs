use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use super::{Provider, placeholder_clip, scene_output_path};
use crate::config::RenderConfig;
use crate::formats::{ProviderOptions, Scene};
use crate::openai::{GenerationError, OpenAiConfig, VideoClient, VideoRequest};
use crate::transcode::Transcoder;

pub const DEFAULT_MODEL: &str = "sora-2";
pub const DEFAULT_POLL_INTERVAL_SEC: f64 = 10.0;
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 60;
pub const DEFAULT_SCENE_SEC: f64 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SoraOptions {
    pub model: String,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
}

impl Default for SoraOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_owned(),
            poll_interval: Duration::from_secs_f64(DEFAULT_POLL_INTERVAL_SEC),
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
        }
    }
}

impl SoraOptions {
    pub fn from_options(options: &ProviderOptions) -> Self {
        let defaults = Self::default();
        let poll_interval = options
            .f64("poll_interval_sec")
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or(defaults.poll_interval);
        let max_poll_attempts = options
            .u64("max_poll_attempts")
            .map(|n| n.clamp(1, u64::from(u32::MAX)) as u32)
            .unwrap_or(defaults.max_poll_attempts);
        Self {
            model: options
                .str("model")
                .map(str::to_owned)
                .unwrap_or(defaults.model),
            poll_interval,
            max_poll_attempts,
        }
    }
}

/// Remote video generation. Any API failure degrades to a placeholder clip
/// and a `provider_fallback` warning; only local I/O and transcoder errors
/// propagate.
///
/// The candidate seed is not part of the request: the API has no seed input.
#[derive(Debug, Clone)]
pub struct SoraProvider {
    config: OpenAiConfig,
    options: SoraOptions,
    transcoder: Transcoder,
}

impl SoraProvider {
    pub fn new(config: OpenAiConfig, options: SoraOptions, transcoder: Transcoder) -> Self {
        Self {
            config,
            options,
            transcoder,
        }
    }

    async fn request_clip(
        &self,
        scene: &Scene,
        out_path: &Path,
        render: &RenderConfig,
        duration_sec: f64,
    ) -> Result<(), GenerationError> {
        let client = VideoClient::new(&self.config)?;
        let request = VideoRequest {
            model: self.options.model.clone(),
            prompt: build_prompt(scene),
            seconds: format!("{}", duration_sec.round().max(1.0) as u64),
            size: render.size(),
        };

        let job = client.create_video(&request).await?;
        tracing::info!(job_id = %job.id, scene_id = %scene.id, model = %request.model, "video job submitted");

        client
            .wait_for_completion(&job.id, self.options.poll_interval, self.options.max_poll_attempts)
            .await?;
        let bytes = client.download_content(&job.id, out_path).await?;
        tracing::info!(job_id = %job.id, scene_id = %scene.id, bytes, "video downloaded");
        Ok(())
    }
}

pub fn build_prompt(scene: &Scene) -> String {
    [&scene.description, &scene.prompt, &scene.sora_prompt]
        .into_iter()
        .flatten()
        .find(|text| !text.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| format!("A professional video scene for {}", scene.id))
}

#[async_trait]
impl Provider for SoraProvider {
    fn name(&self) -> &'static str {
        "sora"
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
        let duration = scene.duration_or(DEFAULT_SCENE_SEC);

        match self.request_clip(scene, &out_path, render, duration).await {
            Ok(()) => Ok(out_path),
            Err(err) => {
                tracing::warn!(
                    event = "provider_fallback",
                    provider = self.name(),
                    episode_id,
                    scene_id = %scene.id,
                    seed = ?seed,
                    reason = err.kind(),
                    error = %err,
                    "video generation failed; using placeholder clip"
                );
                placeholder_clip(&self.transcoder, &out_path, render, duration).await
            }
        }
    }
}
