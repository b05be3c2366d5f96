//! Thin wrapper over the external media tool (ffmpeg/ffprobe).
//!
//! Only command-line construction and process plumbing live here; encoding
//! parameters are passed through verbatim.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::Context as _;
use tokio::process::Command;

use crate::config::RenderConfig;

/// Audio weight of the ambience track relative to the source audio.
pub const AMBIENCE_WEIGHT: f64 = 0.125;

/// Colour of placeholder clips emitted when a scene cannot be resolved.
pub const PLACEHOLDER_COLOR: &str = "0x202833";

/// A transcoder invocation that exited non-zero (or could not be spawned).
#[derive(Debug, thiserror::Error)]
#[error("{tool} failed ({status})\ncommand: {command}\n{stderr}")]
pub struct TranscodeError {
    pub tool: String,
    pub command: String,
    pub status: String,
    pub stderr: String,
}

#[derive(Debug, Clone)]
struct Input {
    args: Vec<String>,
    source: String,
}

/// Builder for one ffmpeg command line.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<Input>,
    output_args: Vec<String>,
    output: String,
}

impl FfmpegCommand {
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output_args: Vec::new(),
            output: output.as_ref().to_string_lossy().to_string(),
        }
    }

    pub fn input(self, source: impl AsRef<Path>) -> Self {
        self.input_with(Vec::<String>::new(), source)
    }

    /// Add an input preceded by input-scoped arguments (`-f`, `-stream_loop`, ...).
    pub fn input_with<I, S>(mut self, args: I, source: impl AsRef<Path>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(Input {
            args: args.into_iter().map(Into::into).collect(),
            source: source.as_ref().to_string_lossy().to_string(),
        });
        self
    }

    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    pub fn frame_rate(self, fps: u32) -> Self {
        self.output_arg("-r").output_arg(fps.to_string())
    }

    pub fn h264(self) -> Self {
        self.output_args(["-c:v", "libx264", "-pix_fmt", "yuv420p"])
    }

    pub fn aac(self) -> Self {
        self.output_args(["-c:a", "aac", "-b:a", "128k"])
    }

    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec!["-y".to_owned(), "-hide_banner".to_owned()];
        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_owned());
            args.push(input.source.clone());
        }
        args.extend(self.output_args.iter().cloned());
        args.push(self.output.clone());
        args
    }
}

#[derive(Debug, Clone)]
pub struct Transcoder {
    ffmpeg_bin: String,
    ffprobe_bin: String,
}

impl Transcoder {
    pub fn new(ffmpeg_bin: impl Into<String>, ffprobe_bin: impl Into<String>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            ffprobe_bin: ffprobe_bin.into(),
        }
    }

    pub fn from_env() -> Self {
        let ffmpeg_bin =
            std::env::var("CUTFORGE_FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_owned());
        let ffprobe_bin =
            std::env::var("CUTFORGE_FFPROBE_BIN").unwrap_or_else(|_| "ffprobe".to_owned());
        Self::new(ffmpeg_bin, ffprobe_bin)
    }

    /// Resolve the ffmpeg binary before any work is scheduled.
    pub fn preflight(&self) -> anyhow::Result<PathBuf> {
        let path = which::which(&self.ffmpeg_bin).map_err(|_| {
            anyhow::anyhow!(
                "ffmpeg not found ({}); install it (macOS: brew install ffmpeg, \
Debian/Ubuntu: apt install ffmpeg) or set CUTFORGE_FFMPEG_BIN",
                self.ffmpeg_bin
            )
        })?;
        tracing::debug!(ffmpeg = %path.display(), "transcoder preflight ok");
        Ok(path)
    }

    /// Run ffmpeg; returns captured stdout.
    pub async fn run(&self, cmd: &FfmpegCommand) -> Result<Vec<u8>, TranscodeError> {
        exec("ffmpeg", &self.ffmpeg_bin, cmd.build_args()).await
    }

    pub async fn solid_color_clip(
        &self,
        out_path: &Path,
        render: &RenderConfig,
        color: &str,
        duration_sec: f64,
    ) -> Result<(), TranscodeError> {
        let source = format!(
            "color=size={}:rate={}:color={color}",
            render.size(),
            render.fps
        );
        let cmd = FfmpegCommand::new(out_path)
            .input_with(["-f", "lavfi"], source)
            .output_args(["-t".to_owned(), format_seconds(duration_sec)])
            .h264();
        self.run(&cmd).await.map(|_| ())
    }

    pub async fn has_audio_stream(&self, path: &Path) -> Result<bool, TranscodeError> {
        let args = [
            "-v",
            "error",
            "-select_streams",
            "a",
            "-show_entries",
            "stream=index",
            "-of",
            "csv=p=0",
        ]
        .into_iter()
        .map(str::to_owned)
        .chain(std::iter::once(path.to_string_lossy().to_string()))
        .collect::<Vec<_>>();

        let stdout = exec("ffprobe", &self.ffprobe_bin, args).await?;
        Ok(!String::from_utf8_lossy(&stdout).trim().is_empty())
    }

    /// Concatenate `clips` into `out_path`, re-encoding to a uniform stream
    /// layout, optionally mixing a looped ambience track under the source audio.
    pub async fn concat(
        &self,
        clips: &[PathBuf],
        out_path: &Path,
        render: &RenderConfig,
        ambience: Option<&Path>,
    ) -> anyhow::Result<()> {
        if clips.is_empty() {
            anyhow::bail!("nothing to concatenate for {}", out_path.display());
        }

        let out_dir = out_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("output must have parent: {}", out_path.display()))?;
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("create output dir: {}", out_dir.display()))?;

        let list_path = out_dir.join("concat.txt");
        std::fs::write(&list_path, concat_list(clips))
            .with_context(|| format!("write concat list: {}", list_path.display()))?;

        let mut cmd =
            FfmpegCommand::new(out_path).input_with(["-f", "concat", "-safe", "0"], &list_path);

        cmd = match ambience {
            Some(ambience) => {
                let source_has_audio = self.has_audio_stream(&clips[0]).await?;
                let cmd = cmd.input_with(["-stream_loop", "-1"], ambience);
                if source_has_audio {
                    cmd.filter_complex(format!(
                        "[0:a][1:a]amix=inputs=2:duration=shortest:weights=1 {AMBIENCE_WEIGHT}[aout]"
                    ))
                    .map("0:v")
                    .map("[aout]")
                } else {
                    cmd.filter_complex(format!("[1:a]volume={AMBIENCE_WEIGHT}[aout]"))
                        .map("0:v")
                        .map("[aout]")
                        .output_arg("-shortest")
                }
            }
            None => cmd.map("0:v").map("0:a?"),
        };

        let cmd = cmd
            .frame_rate(render.fps)
            .video_filter(format!("scale={}:{}", render.width, render.height))
            .h264()
            .aac();

        self.run(&cmd).await?;
        Ok(())
    }

    /// First frame after one second, PNG-encoded.
    pub async fn grab_frame_png(&self, path: &Path) -> Result<Vec<u8>, TranscodeError> {
        let cmd = FfmpegCommand::new("-")
            .input_with(["-ss", "00:00:01"], path)
            .output_args(["-vframes", "1", "-f", "image2pipe", "-vcodec", "png"]);
        self.run(&cmd).await
    }
}

async fn exec(tool: &str, bin: &str, args: Vec<String>) -> Result<Vec<u8>, TranscodeError> {
    let command = format!("{bin} {}", args.join(" "));
    tracing::debug!(tool, %command, "exec");

    let output = Command::new(bin)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|err| TranscodeError {
            tool: tool.to_owned(),
            command: command.clone(),
            status: format!("spawn failed: {err}"),
            stderr: String::new(),
        })?;

    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    if !output.status.success() {
        return Err(TranscodeError {
            tool: tool.to_owned(),
            command,
            status: output.status.to_string(),
            stderr,
        });
    }

    if !stderr.trim().is_empty() {
        tracing::debug!(tool, stderr = %stderr.trim(), "tool diagnostics");
    }
    Ok(output.stdout)
}

/// Concat demuxer list: one `file '<path>'` line per clip.
pub fn concat_list(clips: &[PathBuf]) -> String {
    let mut list = String::new();
    for clip in clips {
        let path = clip.to_string_lossy().replace('\\', "/");
        list.push_str(&format!("file '{}'\n", path.replace('\'', r"'\''")));
    }
    list
}

fn format_seconds(seconds: f64) -> String {
    if seconds.fract() == 0.0 {
        format!("{}", seconds as i64)
    } else {
        format!("{seconds:.3}")
    }
}
