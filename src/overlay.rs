use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::config::{ProjectLayout, RenderConfig};
use crate::formats::{OverlayDensity, OverlayDirective, OverlayPosition, OverlayRef};
use crate::transcode::{FfmpegCommand, Transcoder};

const TEMPLATE_DEFAULT_START_SEC: f64 = 0.5;
const TEMPLATE_DEFAULT_DURATION_SEC: f64 = 2.0;
const BOX_BORDER_WIDTH: u32 = 8;

/// Rendering knobs shared by every overlay in a cut.
#[derive(Debug, Clone, Default)]
pub struct OverlayOptions {
    pub font_path: Option<String>,
    pub density: OverlayDensity,
    /// Accepted and logged; no palette mapping exists yet.
    pub theme: Option<String>,
}

/// Resolve a scene's overlay entries into concrete directives.
///
/// Template references load `assets/templates/overlays/<name>.json` and take
/// their timing from the reference. Missing templates are skipped.
pub fn materialize(layout: &ProjectLayout, refs: &[OverlayRef]) -> anyhow::Result<Vec<OverlayDirective>> {
    let mut directives = Vec::with_capacity(refs.len());
    for overlay in refs {
        if let Some(name) = overlay.spec.as_deref() {
            let path = layout.overlay_template_path(name);
            if !path.exists() {
                tracing::warn!(template = %name, path = %path.display(), "overlay template not found; skipping");
                continue;
            }
            let mut directive = load_template(&path)?;
            directive.start_sec = overlay.start_sec.unwrap_or(TEMPLATE_DEFAULT_START_SEC);
            directive.duration_sec = overlay
                .duration_sec
                .unwrap_or(TEMPLATE_DEFAULT_DURATION_SEC);
            if let Some(position) = overlay.position {
                directive.position = position;
            }
            if let Some(text) = &overlay.text {
                directive.text = text.clone();
            }
            directives.push(directive);
        } else if overlay.kind.is_some() {
            directives.push(overlay.to_inline_directive());
        } else {
            tracing::debug!(?overlay, "overlay entry has neither spec nor type; ignoring");
        }
    }
    Ok(directives)
}

fn load_template(path: &Path) -> anyhow::Result<OverlayDirective> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read overlay template: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse overlay template: {}", path.display()))
}

pub fn density_timing(start_sec: f64, duration_sec: f64, density: OverlayDensity) -> (f64, f64) {
    match density {
        OverlayDensity::Low => (start_sec * 1.3, duration_sec * 1.5),
        OverlayDensity::Medium => (start_sec, duration_sec),
        OverlayDensity::High => (start_sec * 0.8, duration_sec * 0.7),
    }
}

/// `0xRRGGBBAA` to `#RRGGBB@alpha`; anything else passes through unchanged.
pub fn normalize_color(color: &str) -> String {
    let Some(hex) = color.strip_prefix("0x") else {
        return color.to_owned();
    };
    if hex.len() != 8 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return color.to_owned();
    }
    let Ok(alpha) = u8::from_str_radix(&hex[6..8], 16) else {
        return color.to_owned();
    };
    format!("#{}@{:.2}", &hex[..6], f64::from(alpha) / 255.0)
}

fn position_xy(position: OverlayPosition, pad: u32) -> (String, String) {
    match position {
        OverlayPosition::TopLeft => (format!("{pad}"), format!("{pad}")),
        OverlayPosition::TopRight => (format!("w-tw-{pad}"), format!("{pad}")),
        OverlayPosition::BottomLeft => (format!("{pad}"), format!("h-th-{pad}")),
        OverlayPosition::BottomRight => (format!("w-tw-{pad}"), format!("h-th-{pad}")),
    }
}

fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Comma-joined `drawtext` chain for every text directive.
pub fn build_filters(directives: &[OverlayDirective], options: &OverlayOptions) -> String {
    directives
        .iter()
        .filter(|d| d.kind == "text")
        .map(|d| {
            let (start, duration) = density_timing(d.start_sec, d.duration_sec, options.density);
            let (x, y) = position_xy(d.position, d.padding);
            let font = options
                .font_path
                .as_deref()
                .map(|path| format!(":fontfile={path}"))
                .unwrap_or_default();
            format!(
                "drawtext=text='{text}'{font}:x={x}:y={y}:fontsize={size}:fontcolor={color}\
:box=1:boxcolor={bg}:boxborderw={BOX_BORDER_WIDTH}:enable='between(t\\,{start}\\,{end})'",
                text = escape_text(&d.text),
                size = d.font_size,
                color = d.font_color,
                bg = normalize_color(&d.bg_color),
                end = start + duration,
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Burn `directives` into `input`, writing `output`.
pub async fn apply_overlays(
    transcoder: &Transcoder,
    input: &Path,
    directives: &[OverlayDirective],
    output: &Path,
    render: &RenderConfig,
    options: &OverlayOptions,
) -> anyhow::Result<PathBuf> {
    if let Some(theme) = options.theme.as_deref() {
        tracing::debug!(theme, "overlay theme requested");
    }

    let filters = build_filters(directives, options);
    let mut cmd = FfmpegCommand::new(output).input(input);
    if !filters.is_empty() {
        cmd = cmd.video_filter(filters);
    }
    cmd = cmd.frame_rate(render.fps).h264();
    cmd = if transcoder.has_audio_stream(input).await? {
        cmd.aac()
    } else {
        cmd.output_arg("-an")
    };

    transcoder.run(&cmd).await?;
    tracing::debug!(
        input = %input.display(),
        output = %output.display(),
        overlays = directives.len(),
        "overlays applied"
    );
    Ok(output.to_path_buf())
}
