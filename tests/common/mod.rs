#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt as _;
use std::path::{Path, PathBuf};

/// Writes its command line into the output file (last argument); prints fake
/// PNG bytes when the output is stdout.
const FAKE_FFMPEG: &str = r#"#!/bin/sh
for last; do :; done
if [ "$last" = "-" ]; then printf 'PNG'; exit 0; fi
printf 'fake-media %s\n' "$*" > "$last"
"#;

const FAILING_FFMPEG: &str = r#"#!/bin/sh
echo "Invalid argument: simulated encoder failure" >&2
exit 1
"#;

/// Reports no audio streams.
const FAKE_FFPROBE: &str = "#!/bin/sh\nexit 0\n";

pub const RECIPE: &str = r#"schema_version: "0.1.0"
metadata:
  title: Test Cut
source:
  commit_sha: abc123
audience_profile: general
scope:
  include_episodes: [ep1]
render:
  fps: 24
  resolution: 320x240
  aspect: "4:3"
provider:
  name: dummy
  options: {}
overlays:
  enabled: false
"#;

pub const EPISODE: &str = r#"episode_id: ep1
scenes:
  - id: s1
    duration_sec: 2
    captions_cues:
      - { text: Hello, start_sec: 0.5 }
"#;

pub struct Project {
    dir: tempfile::TempDir,
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Project {
    pub fn new() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let tools = dir.path().join(".tools");
        std::fs::create_dir_all(&tools)?;
        let ffmpeg = install_script(&tools.join("ffmpeg"), FAKE_FFMPEG)?;
        let ffprobe = install_script(&tools.join("ffprobe"), FAKE_FFPROBE)?;

        let project = Self {
            dir,
            ffmpeg,
            ffprobe,
        };
        project.write("recipe.yaml", RECIPE)?;
        project.write("episodes/ep1/episode.yaml", EPISODE)?;
        Ok(project)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    pub fn write(&self, rel: &str, contents: &str) -> anyhow::Result<PathBuf> {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn read(&self, rel: &str) -> anyhow::Result<String> {
        Ok(std::fs::read_to_string(self.path(rel))?)
    }

    pub fn break_ffmpeg(&self) -> anyhow::Result<()> {
        install_script(&self.ffmpeg, FAILING_FFMPEG)?;
        Ok(())
    }

    /// `cutforge` with the fake transcoder and this project as `--root` target.
    pub fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("cutforge");
        cmd.current_dir(self.root())
            .env("CUTFORGE_FFMPEG_BIN", &self.ffmpeg)
            .env("CUTFORGE_FFPROBE_BIN", &self.ffprobe)
            .env_remove("OPENAI_API_KEY")
            .env_remove("CUTFORGE_OPENAI_BASE_URL")
            .env_remove("RUST_LOG");
        cmd
    }

    pub fn compile(&self, extra: &[&str]) -> assert_cmd::Command {
        let mut cmd = self.cmd();
        cmd.args(["compile", "--recipe", "recipe.yaml", "--root", "."])
            .args(extra);
        cmd
    }

    pub fn cut_id(&self) -> anyhow::Result<String> {
        let raw: serde_json::Value = serde_yaml::from_str(&self.read("recipe.yaml")?)?;
        Ok(cutforge::address::compute_hash(&raw))
    }

    pub fn manifest(&self) -> anyhow::Result<serde_json::Value> {
        let cut_id = self.cut_id()?;
        let raw = self.read(&format!("output/cuts/{cut_id}/manifest/cut.manifest.json"))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

fn install_script(path: &Path, body: &str) -> anyhow::Result<PathBuf> {
    std::fs::write(path, body)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    Ok(path.to_path_buf())
}
