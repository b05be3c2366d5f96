//! Subtitle emission (SRT + ASS) for compiled episodes.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::config::ProjectLayout;
use crate::formats::{
    CaptionCue, CaptionFiles, CaptionMetadata, EpisodeManifest, SceneCaptionFiles,
};

/// Cue length when a cue has no explicit end.
pub const DEFAULT_CUE_SEC: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Eq)]
struct CaptionEvent {
    start_ms: u64,
    end_ms: u64,
    text: String,
}

fn to_ms(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0) as u64
}

fn events(cues: &[CaptionCue], offset_sec: f64) -> Vec<CaptionEvent> {
    let mut events = cues
        .iter()
        .map(|cue| {
            let start = cue.start_sec + offset_sec;
            let end = cue
                .end_sec
                .map(|end| end + offset_sec)
                .unwrap_or(start + DEFAULT_CUE_SEC);
            CaptionEvent {
                start_ms: to_ms(start),
                end_ms: to_ms(end),
                text: cue.text.clone(),
            }
        })
        .collect::<Vec<_>>();
    events.sort_by_key(|e| e.start_ms);
    events
}

fn srt_timestamp(ms: u64) -> String {
    let (h, rem) = (ms / 3_600_000, ms % 3_600_000);
    let (m, rem) = (rem / 60_000, rem % 60_000);
    let (s, ms) = (rem / 1000, rem % 1000);
    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}

fn ass_timestamp(ms: u64) -> String {
    let (h, rem) = (ms / 3_600_000, ms % 3_600_000);
    let (m, rem) = (rem / 60_000, rem % 60_000);
    let (s, cs) = (rem / 1000, (rem % 1000) / 10);
    format!("{h}:{m:02}:{s:02}.{cs:02}")
}

fn render_srt(events: &[CaptionEvent]) -> String {
    let mut out = String::new();
    for (idx, event) in events.iter().enumerate() {
        let _ = writeln!(out, "{}", idx + 1);
        let _ = writeln!(
            out,
            "{} --> {}",
            srt_timestamp(event.start_ms),
            srt_timestamp(event.end_ms)
        );
        let _ = writeln!(out, "{}", event.text);
        out.push('\n');
    }
    out
}

const ASS_HEADER: &str = "\
[Script Info]
ScriptType: v4.00+
WrapStyle: 0
ScaledBorderAndShadow: yes
Collisions: Normal

[V4+ Styles]
Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding
Style: Default,Arial,20,&H00FFFFFF,&H000000FF,&H00000000,&H00000000,0,0,0,0,100,100,0,0,1,2,2,2,10,10,10,1

[Events]
Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text
";

fn render_ass(events: &[CaptionEvent]) -> String {
    let mut out = ASS_HEADER.to_owned();
    for event in events {
        let text = event.text.replace("\r\n", "\n").replace('\n', "\\N");
        let _ = writeln!(
            out,
            "Dialogue: 0,{},{},Default,,0,0,0,,{text}",
            ass_timestamp(event.start_ms),
            ass_timestamp(event.end_ms),
        );
    }
    out
}

/// Write `<dir>/<stem>.srt` and `<dir>/<stem>.ass`. `None` when there are no cues.
pub fn write_captions(
    cues: &[CaptionCue],
    offset_sec: f64,
    dir: &Path,
    stem: &str,
) -> anyhow::Result<Option<(PathBuf, PathBuf)>> {
    if cues.is_empty() {
        return Ok(None);
    }
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create captions dir: {}", dir.display()))?;

    let events = events(cues, offset_sec);
    let srt_path = dir.join(format!("{stem}.srt"));
    let ass_path = dir.join(format!("{stem}.ass"));
    std::fs::write(&srt_path, render_srt(&events))
        .with_context(|| format!("write srt: {}", srt_path.display()))?;
    std::fs::write(&ass_path, render_ass(&events))
        .with_context(|| format!("write ass: {}", ass_path.display()))?;
    Ok(Some((srt_path, ass_path)))
}

/// Episode-level cues win; otherwise each scene's cues are shifted by the
/// summed durations of the scenes before it.
pub fn generate_episode_captions(
    layout: &ProjectLayout,
    episode_id: &str,
    cut_id: &str,
    manifest: &EpisodeManifest,
) -> anyhow::Result<CaptionMetadata> {
    let captions_dir = layout.episode_output_dir(episode_id).join("captions");
    let mut metadata = CaptionMetadata::default();

    if !manifest.captions_cues.is_empty() {
        let stem = format!("{episode_id}__{cut_id}");
        if let Some((srt, ass)) = write_captions(&manifest.captions_cues, 0.0, &captions_dir, &stem)? {
            metadata.episode_captions = Some(CaptionFiles {
                srt_path: layout.relative(&srt),
                ass_path: layout.relative(&ass),
            });
        }
        return Ok(metadata);
    }

    let mut offset = 0.0;
    for scene in &manifest.scenes {
        let stem = format!("{episode_id}__{cut_id}_{}", scene.id);
        let scene_dir = captions_dir.join(&scene.id);
        if let Some((srt, ass)) = write_captions(&scene.captions_cues, offset, &scene_dir, &stem)? {
            metadata.scene_captions.push(SceneCaptionFiles {
                scene_id: scene.id.clone(),
                srt_path: layout.relative(&srt),
                ass_path: layout.relative(&ass),
            });
        }
        offset += scene.timeline_duration();
    }

    if !metadata.is_empty() {
        tracing::debug!(
            episode_id,
            scenes = metadata.scene_captions.len(),
            "per-scene captions written"
        );
    }
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cue(text: &str, start_sec: f64, end_sec: Option<f64>) -> CaptionCue {
        CaptionCue {
            text: text.to_owned(),
            start_sec,
            end_sec,
        }
    }

    #[test]
    fn timestamps_use_each_format() {
        assert_eq!(srt_timestamp(3_723_045), "01:02:03,045");
        assert_eq!(ass_timestamp(3_723_045), "1:02:03.04");
        assert_eq!(srt_timestamp(0), "00:00:00,000");
    }

    #[test]
    fn events_sort_and_default_end() {
        let events = events(&[cue("b", 5.0, None), cue("a", 1.0, Some(2.5))], 10.0);
        assert_eq!(
            events,
            vec![
                CaptionEvent {
                    start_ms: 11_000,
                    end_ms: 12_500,
                    text: "a".to_owned()
                },
                CaptionEvent {
                    start_ms: 15_000,
                    end_ms: 18_000,
                    text: "b".to_owned()
                },
            ]
        );
    }

    #[test]
    fn srt_and_ass_bodies() {
        let events = events(&[cue("Hello\nworld", 1.0, Some(2.0))], 0.0);
        assert_eq!(
            render_srt(&events),
            "1\n00:00:01,000 --> 00:00:02,000\nHello\nworld\n\n"
        );
        let ass = render_ass(&events);
        assert!(ass.starts_with("[Script Info]"));
        assert!(ass.ends_with("Dialogue: 0,0:00:01.00,0:00:02.00,Default,,0,0,0,,Hello\\Nworld\n"));
    }

    #[test]
    fn episode_cues_take_precedence() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let layout = ProjectLayout::new(dir.path());
        let manifest: EpisodeManifest = serde_yaml::from_str(
            "\
captions_cues:
  - { text: Hi, start_sec: 0.5 }
scenes:
  - id: s1
    captions_cues: [{ text: ignored, start_sec: 0 }]
",
        )?;

        let meta = generate_episode_captions(&layout, "ep1", "CUT", &manifest)?;
        let files = meta.episode_captions.expect("episode captions");
        assert_eq!(files.srt_path, "output/episodes/ep1/captions/ep1__CUT.srt");
        assert_eq!(files.ass_path, "output/episodes/ep1/captions/ep1__CUT.ass");
        assert!(meta.scene_captions.is_empty());
        assert!(layout.resolve(&files.srt_path).is_file());
        Ok(())
    }

    #[test]
    fn scene_cues_are_offset_by_preceding_durations() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let layout = ProjectLayout::new(dir.path());
        let manifest: EpisodeManifest = serde_yaml::from_str(
            "\
scenes:
  - id: s1
    duration_sec: 4
  - id: s2
    duration_sec: 2
    captions_cues: [{ text: Second, start_sec: 1 }]
",
        )?;

        let meta = generate_episode_captions(&layout, "ep1", "CUT", &manifest)?;
        assert!(meta.episode_captions.is_none());
        assert_eq!(meta.scene_captions.len(), 1);
        let s2 = &meta.scene_captions[0];
        assert_eq!(s2.scene_id, "s2");
        assert_eq!(s2.srt_path, "output/episodes/ep1/captions/s2/ep1__CUT_s2.srt");

        let srt = std::fs::read_to_string(layout.resolve(&s2.srt_path))?;
        assert!(srt.contains("00:00:05,000 --> 00:00:08,000"), "{srt}");
        Ok(())
    }

    #[test]
    fn no_cues_means_no_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let layout = ProjectLayout::new(dir.path());
        let manifest: EpisodeManifest = serde_yaml::from_str("scenes: [{ id: s1 }]\n")?;
        let meta = generate_episode_captions(&layout, "ep1", "CUT", &manifest)?;
        assert!(meta.is_empty());
        assert!(!layout.episode_output_dir("ep1").join("captions").exists());
        Ok(())
    }
}
