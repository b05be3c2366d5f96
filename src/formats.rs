use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudienceProfile {
    General,
    Dev,
}

impl AudienceProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Dev => "dev",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayDensity {
    Low,
    #[default]
    Medium,
    High,
}

/// A compilation request, parsed once after schema validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub schema_version: String,
    #[serde(default)]
    pub metadata: RecipeMetadata,
    #[serde(default)]
    pub source: SourceRef,
    pub audience_profile: AudienceProfile,
    pub scope: Scope,
    #[serde(default)]
    pub render: RenderParams,
    pub provider: ProviderSelection,
    #[serde(default)]
    pub overlays: OverlayPolicy,
    #[serde(default)]
    pub captions: CaptionsPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ending: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
}

impl Recipe {
    pub fn commit_sha(&self) -> &str {
        self.source.commit_sha.as_deref().unwrap_or("HEAD")
    }

    pub fn timeline(&self) -> &str {
        self.timeline
            .as_deref()
            .or(self.metadata.timeline.as_deref())
            .unwrap_or("Prime")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipeMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scope {
    pub include_episodes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderParams {
    #[serde(
        default,
        deserialize_with = "whole_fps",
        skip_serializing_if = "Option::is_none"
    )]
    pub fps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSelection {
    pub name: String,
    #[serde(default)]
    pub options: ProviderOptions,
}

/// Free-form provider options. Known keys are read through typed accessors;
/// anything else is kept for the provider (and for hashing) untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderOptions(pub BTreeMap<String, serde_json::Value>);

impl ProviderOptions {
    pub fn num_candidates(&self) -> usize {
        self.0
            .get("num_candidates")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(1)
            .max(1)
    }

    pub fn seed_base(&self) -> Option<i64> {
        self.0.get("seed_base").and_then(|v| v.as_i64())
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(|v| v.as_f64())
    }

    pub fn u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(|v| v.as_u64())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverlayPolicy {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub density: OverlayDensity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptionsPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub audio: EpisodeAudio,
    #[serde(default)]
    pub captions_cues: Vec<CaptionCue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpisodeAudio {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ambience: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default = "default_scene_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sora_prompt: Option<String>,
    #[serde(default)]
    pub overlays: Vec<OverlayRef>,
    #[serde(default)]
    pub captions_cues: Vec<CaptionCue>,
}

fn default_scene_id() -> String {
    "scene".to_owned()
}

impl Scene {
    /// Declared duration, or `default` when absent or non-positive.
    pub fn duration_or(&self, default: f64) -> f64 {
        match self.duration_sec {
            Some(duration) if duration > 0.0 => duration,
            _ => default,
        }
    }

    /// Duration used for timeline arithmetic (captions offsets).
    pub fn timeline_duration(&self) -> f64 {
        self.duration_sec.unwrap_or(0.0).max(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionCue {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub start_sec: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_sec: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayPosition {
    TopLeft,
    #[default]
    TopRight,
    BottomLeft,
    BottomRight,
}

/// An overlay entry as written in an episode manifest: either a reference to
/// a named template (`spec`) or an inline directive (`type`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverlayRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<OverlayPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_sec: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<u32>,
}

/// A fully materialised text overlay, ready for the filter builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayDirective {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default = "default_overlay_kind")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub position: OverlayPosition,
    #[serde(default)]
    pub start_sec: f64,
    #[serde(default = "default_overlay_duration")]
    pub duration_sec: f64,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default = "default_font_color")]
    pub font_color: String,
    #[serde(default = "default_bg_color")]
    pub bg_color: String,
    #[serde(default = "default_padding")]
    pub padding: u32,
}

fn default_overlay_kind() -> String {
    "text".to_owned()
}

fn default_overlay_duration() -> f64 {
    2.0
}

fn default_font_size() -> u32 {
    28
}

fn default_font_color() -> String {
    "white".to_owned()
}

fn default_bg_color() -> String {
    "0x333333AA".to_owned()
}

fn default_padding() -> u32 {
    12
}

impl OverlayRef {
    /// Inline directive with defaults applied for every omitted field.
    pub fn to_inline_directive(&self) -> OverlayDirective {
        OverlayDirective {
            name: self.name.clone(),
            kind: self.kind.clone().unwrap_or_else(default_overlay_kind),
            text: self.text.clone().unwrap_or_default(),
            position: self.position.unwrap_or_default(),
            start_sec: self.start_sec.unwrap_or(0.0),
            duration_sec: self.duration_sec.unwrap_or_else(default_overlay_duration),
            font_size: self.font_size.unwrap_or_else(default_font_size),
            font_color: self.font_color.clone().unwrap_or_else(default_font_color),
            bg_color: self.bg_color.clone().unwrap_or_else(default_bg_color),
            padding: self.padding.unwrap_or_else(default_padding),
        }
    }
}

/// Reviewer-authored winner choices for one (episode, cut) pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cut_id: Option<String>,
    #[serde(default)]
    pub scenes: BTreeMap<String, SceneSelection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SceneSelection {
    Index(i64),
    Detailed(SceneSelectionDetail),
    Unrecognized(serde_yaml::Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSelectionDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_index: Option<i64>,
    /// Informational copy of the ledger; hand-edited or malformed entries are
    /// dropped so they never hide `winner_index`.
    #[serde(default, deserialize_with = "lenient_candidates")]
    pub candidates: Vec<CandidateRecord>,
}

fn lenient_candidates<'de, D>(deserializer: D) -> Result<Vec<CandidateRecord>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    let serde_yaml::Value::Sequence(entries) = value else {
        return Ok(Vec::new());
    };
    Ok(entries
        .into_iter()
        .filter_map(|entry| serde_yaml::from_value(entry).ok())
        .collect())
}

/// Whole-number frame rates; `24` and `24.0` are the same value.
pub(crate) fn whole_fps<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let Some(value) = Option::<f64>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if value.fract() != 0.0 || value < 0.0 || value > f64::from(u32::MAX) {
        return Err(serde::de::Error::custom(format!(
            "fps must be a whole number, got {value}"
        )));
    }
    Ok(Some(value as u32))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateLedger {
    pub scene_id: String,
    pub candidates: Vec<CandidateRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub index: usize,
    pub seed: i64,
    pub path: String,
    pub duration_sec: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CutManifest {
    pub cut_id: String,
    pub cut_uri: String,
    pub recipe_hash: String,
    pub commit_sha: String,
    pub timeline: String,
    pub recipe_snapshot: serde_json::Value,
    pub episodes: Vec<EpisodeOutput>,
    pub render: RenderSummary,
    pub created: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidates_root: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSummary {
    pub fps: u32,
    pub resolution: String,
    pub aspect: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeOutput {
    pub episode_id: String,
    pub video_path: String,
    #[serde(default, skip_serializing_if = "CaptionMetadata::is_empty")]
    pub captions: CaptionMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_captions: Option<CaptionFiles>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scene_captions: Vec<SceneCaptionFiles>,
}

impl CaptionMetadata {
    pub fn is_empty(&self) -> bool {
        self.episode_captions.is_none() && self.scene_captions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionFiles {
    pub srt_path: String,
    pub ass_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneCaptionFiles {
    pub scene_id: String,
    pub srt_path: String,
    pub ass_path: String,
}
