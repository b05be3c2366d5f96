//! Scene media providers.
//!
//! A provider turns one scene into one clip at `<output_dir>/<scene_id>.mp4`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;

use crate::config::{ProjectLayout, RenderConfig};
use crate::formats::{ProviderSelection, Scene};
use crate::openai::OpenAiConfig;
use crate::transcode::{PLACEHOLDER_COLOR, Transcoder};

pub mod dummy;
pub mod prebaked;
pub mod sora;

pub use dummy::DummyProvider;
pub use prebaked::PrebakedProvider;
pub use sora::SoraProvider;

pub const SUPPORTED_PROVIDERS: &[&str] = &["prebaked", "dummy", "sora"];

#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Produce (or resolve) the clip for `scene`, returning its path.
    async fn generate_scene(
        &self,
        episode_id: &str,
        scene: &Scene,
        output_dir: &Path,
        render: &RenderConfig,
        seed: Option<i64>,
    ) -> anyhow::Result<PathBuf>;
}

/// Build the provider named in the recipe. Unknown names are a configuration error.
pub fn from_selection(
    selection: &ProviderSelection,
    layout: &ProjectLayout,
    transcoder: Transcoder,
) -> anyhow::Result<Arc<dyn Provider>> {
    let provider: Arc<dyn Provider> = match selection.name.as_str() {
        "prebaked" => Arc::new(PrebakedProvider::new(layout.clone(), transcoder)),
        "dummy" => Arc::new(DummyProvider::new(transcoder)),
        "sora" => Arc::new(SoraProvider::new(
            OpenAiConfig::from_env(),
            sora::SoraOptions::from_options(&selection.options),
            transcoder,
        )),
        other => anyhow::bail!(
            "unsupported provider '{other}' (supported: {})",
            SUPPORTED_PROVIDERS.join(", ")
        ),
    };
    tracing::debug!(provider = provider.name(), "provider selected");
    Ok(provider)
}

pub(crate) fn scene_output_path(output_dir: &Path, scene: &Scene) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("create scene output dir: {}", output_dir.display()))?;
    Ok(output_dir.join(format!("{}.mp4", scene.id)))
}

/// Solid-colour stand-in used whenever a scene cannot be resolved.
pub(crate) async fn placeholder_clip(
    transcoder: &Transcoder,
    out_path: &Path,
    render: &RenderConfig,
    duration_sec: f64,
) -> anyhow::Result<PathBuf> {
    transcoder
        .solid_color_clip(out_path, render, PLACEHOLDER_COLOR, duration_sec)
        .await
        .with_context(|| format!("generate placeholder clip: {}", out_path.display()))?;
    Ok(out_path.to_path_buf())
}

#[cfg(all(test, unix))]
pub(crate) mod test_support {
    use std::os::unix::fs::PermissionsExt as _;
    use std::path::Path;

    use crate::config::RenderConfig;
    use crate::formats::Scene;
    use crate::transcode::Transcoder;

    const FAKE_FFMPEG: &str = r#"#!/bin/sh
for last; do :; done
if [ "$last" = "-" ]; then printf 'PNG'; exit 0; fi
printf 'fake-media %s\n' "$*" > "$last"
"#;

    const FAKE_FFPROBE: &str = "#!/bin/sh\nexit 0\n";

    pub fn fake_transcoder(dir: &Path) -> anyhow::Result<Transcoder> {
        let ffmpeg = dir.join("ffmpeg");
        let ffprobe = dir.join("ffprobe");
        for (path, body) in [(&ffmpeg, FAKE_FFMPEG), (&ffprobe, FAKE_FFPROBE)] {
            std::fs::write(path, body)?;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
        }
        Ok(Transcoder::new(
            ffmpeg.to_string_lossy(),
            ffprobe.to_string_lossy(),
        ))
    }

    pub fn render() -> RenderConfig {
        RenderConfig::from_strings("320x240", 24, "4:3").expect("valid render config")
    }

    pub fn scene(yaml: &str) -> Scene {
        serde_yaml::from_str(yaml).expect("valid scene yaml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::ProviderOptions;

    fn selection(name: &str) -> ProviderSelection {
        ProviderSelection {
            name: name.to_owned(),
            options: ProviderOptions::default(),
        }
    }

    #[test]
    fn factory_maps_known_names() -> anyhow::Result<()> {
        let layout = ProjectLayout::new("/proj");
        for name in SUPPORTED_PROVIDERS {
            let provider =
                from_selection(&selection(name), &layout, Transcoder::new("ffmpeg", "ffprobe"))?;
            assert_eq!(provider.name(), *name);
        }
        Ok(())
    }

    #[test]
    fn factory_rejects_unknown_names() {
        let layout = ProjectLayout::new("/proj");
        let err = from_selection(
            &selection("runway"),
            &layout,
            Transcoder::new("ffmpeg", "ffprobe"),
        )
        .err()
        .expect("unknown provider must fail");
        let message = err.to_string();
        assert!(message.contains("unsupported provider 'runway'"), "{message}");
        assert!(message.contains("prebaked, dummy, sora"), "{message}");
    }
}
