//! Reviewer tooling for candidates-only cuts: per-episode selection templates
//! and an HTML contact sheet.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use base64::Engine as _;

use crate::cli::SelectArgs;
use crate::config::ProjectLayout;
use crate::episode;
use crate::formats::{
    CandidateLedger, CandidateRecord, CutManifest, SceneSelection, SceneSelectionDetail,
    SelectionDoc,
};
use crate::selection;
use crate::transcode::Transcoder;

#[derive(Debug, Clone)]
pub struct SceneReview {
    pub scene_id: String,
    pub winner_index: usize,
    pub candidates: Vec<CandidateRecord>,
}

#[derive(Debug, Clone)]
pub struct EpisodeReview {
    pub episode_id: String,
    pub scenes: Vec<SceneReview>,
}

pub fn load_cut_manifest(path: &Path) -> anyhow::Result<CutManifest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read cut manifest: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse cut manifest: {}", path.display()))
}

fn scoped_episodes(manifest: &CutManifest) -> Vec<String> {
    manifest
        .recipe_snapshot
        .pointer("/scope/include_episodes")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default()
}

fn read_ledger(path: &Path) -> Vec<CandidateRecord> {
    let Ok(raw) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    match serde_json::from_str::<CandidateLedger>(&raw) {
        Ok(ledger) => ledger.candidates,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "unreadable candidate ledger");
            Vec::new()
        }
    }
}

/// Build one selection template per episode of the cut. Winner choices
/// already present in an existing selection file are carried over.
pub fn build_selections(layout: &ProjectLayout, manifest: &CutManifest) -> anyhow::Result<Vec<EpisodeReview>> {
    let cut_id = manifest.cut_id.as_str();
    let mut reviews = Vec::new();

    for episode_id in scoped_episodes(manifest) {
        let episode_manifest = match episode::load_manifest(layout, &episode_id) {
            Ok(m) => m,
            Err(err) => {
                tracing::warn!(episode_id = %episode_id, error = %format!("{err:#}"), "skipping episode");
                continue;
            }
        };

        let selection_path = layout.selection_path(&episode_id, cut_id);
        let existing = selection::load(&selection_path);

        let scenes = episode_manifest
            .scenes
            .iter()
            .map(|scene| {
                let candidates = read_ledger(&layout.ledger_path(cut_id, &episode_id, &scene.id));
                let winner_index = match existing.as_ref() {
                    Some(doc) => selection::resolve_winner(Some(doc), &scene.id, candidates.len().max(1)),
                    None => 1,
                };
                SceneReview {
                    scene_id: scene.id.clone(),
                    winner_index,
                    candidates,
                }
            })
            .collect::<Vec<_>>();

        let doc = SelectionDoc {
            episode_id: Some(episode_id.clone()),
            cut_id: Some(cut_id.to_owned()),
            scenes: scenes
                .iter()
                .map(|scene| {
                    (
                        scene.scene_id.clone(),
                        SceneSelection::Detailed(SceneSelectionDetail {
                            winner_index: Some(scene.winner_index as i64),
                            candidates: scene.candidates.clone(),
                        }),
                    )
                })
                .collect(),
        };
        write_yaml(&selection_path, &doc)?;
        tracing::info!(episode_id = %episode_id, path = %selection_path.display(), "selection template written");

        reviews.push(EpisodeReview { episode_id, scenes });
    }

    Ok(reviews)
}

fn write_yaml<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create dir: {}", parent.display()))?;
    }
    let text = serde_yaml::to_string(value).context("serialize yaml")?;
    std::fs::write(path, text).with_context(|| format!("write {}", path.display()))
}

async fn thumbnail(transcoder: &Transcoder, video: &Path) -> Option<String> {
    if !video.is_file() {
        return None;
    }
    match transcoder.grab_frame_png(video).await {
        Ok(png) if !png.is_empty() => Some(format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png)
        )),
        Ok(_) => None,
        Err(err) => {
            tracing::debug!(video = %video.display(), error = %err, "thumbnail extraction failed");
            None
        }
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const SHEET_STYLE: &str = "\
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; background: #1a1a1a; color: #fff; padding: 20px; }
h1 { color: #4a9eff; }
h2 { color: #7cb342; margin-top: 40px; border-bottom: 2px solid #333; padding-bottom: 10px; }
h3 { color: #ffa726; margin-top: 30px; }
.scene { margin-bottom: 40px; background: #2a2a2a; padding: 20px; border-radius: 8px; }
.candidates { display: grid; grid-template-columns: repeat(auto-fit, minmax(300px, 1fr)); gap: 20px; margin-top: 20px; }
.candidate { background: #333; padding: 15px; border-radius: 8px; text-align: center; }
.candidate.winner { border: 3px solid #4a9eff; background: #1a3a5a; }
.candidate img { max-width: 100%; height: auto; border-radius: 4px; }
.candidate-label { font-weight: bold; color: #4a9eff; margin-bottom: 10px; font-size: 18px; }
.path { font-size: 11px; color: #888; margin-top: 8px; word-break: break-all; }
.no-video { padding: 40px; background: #444; border-radius: 4px; color: #999; }
.instructions { background: #2a3a4a; padding: 20px; border-radius: 8px; margin-bottom: 30px; border-left: 4px solid #4a9eff; }
";

pub async fn render_contact_sheet(
    layout: &ProjectLayout,
    transcoder: &Transcoder,
    cut_id: &str,
    reviews: &[EpisodeReview],
) -> anyhow::Result<String> {
    let cut = escape_html(cut_id);
    let mut html = String::new();
    writeln!(html, "<!DOCTYPE html>\n<html><head>\n<meta charset='utf-8'>")?;
    writeln!(html, "<title>Candidate Review - {cut}</title>")?;
    writeln!(html, "<style>\n{SHEET_STYLE}</style>\n</head><body>")?;
    writeln!(html, "<h1>Candidate Review: {cut}</h1>")?;
    writeln!(
        html,
        "<div class='instructions'>Edit <code>episodes/&lt;ep&gt;/renders/selections/{cut}.yaml</code>, \
set <code>winner_index</code> per scene, then re-run <code>cutforge compile</code> without \
<code>--candidates-only</code>.</div>"
    )?;

    for review in reviews {
        writeln!(html, "<div class='episode'>\n<h2>Episode: {}</h2>", escape_html(&review.episode_id))?;
        for scene in &review.scenes {
            writeln!(html, "<div class='scene'>\n<h3>Scene: {}</h3>", escape_html(&scene.scene_id))?;
            writeln!(html, "<div class='candidates'>")?;
            for candidate in &scene.candidates {
                let is_winner = candidate.index == scene.winner_index;
                let class = if is_winner { "candidate winner" } else { "candidate" };
                let label = if is_winner {
                    format!("Candidate {} (current winner)", candidate.index)
                } else {
                    format!("Candidate {}", candidate.index)
                };
                writeln!(html, "<div class='{class}'>\n<div class='candidate-label'>{label}</div>")?;

                let video: PathBuf = layout.resolve(&candidate.path);
                match thumbnail(transcoder, &video).await {
                    Some(uri) => writeln!(html, "<img src='{uri}' alt='Candidate {}'>", candidate.index)?,
                    None => writeln!(
                        html,
                        "<div class='no-video'>Video not found or could not extract frame</div>"
                    )?,
                }
                writeln!(html, "<div class='path'>{}</div>\n</div>", escape_html(&candidate.path))?;
            }
            writeln!(html, "</div>\n</div>")?;
        }
        writeln!(html, "</div>")?;
    }
    writeln!(html, "</body></html>")?;
    Ok(html)
}

pub async fn run(args: SelectArgs) -> anyhow::Result<()> {
    let layout = ProjectLayout::new(&args.root);
    let manifest = load_cut_manifest(Path::new(&args.cut_manifest))?;
    let reviews = build_selections(&layout, &manifest)?;
    if reviews.is_empty() {
        tracing::warn!(cut_id = %manifest.cut_id, "no episodes to review");
        return Ok(());
    }

    let transcoder = Transcoder::from_env();
    let html = render_contact_sheet(&layout, &transcoder, &manifest.cut_id, &reviews).await?;
    let sheet_path = layout.review_sheet_path(&manifest.cut_id);
    if let Some(parent) = sheet_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create dir: {}", parent.display()))?;
    }
    std::fs::write(&sheet_path, html)
        .with_context(|| format!("write contact sheet: {}", sheet_path.display()))?;

    for review in &reviews {
        println!(
            "selection: {}",
            layout.selection_path(&review.episode_id, &manifest.cut_id).display()
        );
    }
    println!("review: {}", sheet_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::write_json_atomic;

    fn project() -> anyhow::Result<(tempfile::TempDir, ProjectLayout, CutManifest)> {
        let dir = tempfile::tempdir()?;
        let layout = ProjectLayout::new(dir.path());

        let ep_manifest = layout.episode_manifest_path("ep1");
        std::fs::create_dir_all(ep_manifest.parent().unwrap())?;
        std::fs::write(&ep_manifest, "scenes:\n  - id: s1\n  - id: s2\n")?;

        let ledger = CandidateLedger {
            scene_id: "s1".to_owned(),
            candidates: (1..=2)
                .map(|index| CandidateRecord {
                    index,
                    seed: index as i64,
                    path: format!("output/tmp/CUT/ep1/s1/cand{index}/s1.mp4"),
                    duration_sec: 1.0,
                })
                .collect(),
        };
        write_json_atomic(&layout.ledger_path("CUT", "ep1", "s1"), &ledger)?;

        let manifest: CutManifest = serde_json::from_value(serde_json::json!({
            "cut_id": "CUT",
            "cut_uri": "chcut://HEAD/CUT?audience=general&v=0.1",
            "recipe_hash": "CUT",
            "commit_sha": "HEAD",
            "timeline": "Prime",
            "recipe_snapshot": { "scope": { "include_episodes": ["ep1", "ep-missing"] } },
            "episodes": [],
            "render": { "fps": 24, "resolution": "1080x1920", "aspect": "9:16" },
            "created": "2025-01-01T00:00:00Z",
            "candidates_root": "output/tmp/CUT",
        }))?;
        Ok((dir, layout, manifest))
    }

    #[test]
    fn templates_default_to_first_candidate() -> anyhow::Result<()> {
        let (_dir, layout, manifest) = project()?;
        let reviews = build_selections(&layout, &manifest)?;

        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].scenes.len(), 2);
        assert_eq!(reviews[0].scenes[0].winner_index, 1);
        assert_eq!(reviews[0].scenes[0].candidates.len(), 2);
        assert!(reviews[0].scenes[1].candidates.is_empty());

        let doc = selection::load(&layout.selection_path("ep1", "CUT")).expect("template");
        assert_eq!(doc.cut_id.as_deref(), Some("CUT"));
        assert_eq!(selection::resolve_winner(Some(&doc), "s1", 2), 1);
        match &doc.scenes["s1"] {
            SceneSelection::Detailed(detail) => assert_eq!(detail.candidates.len(), 2),
            other => panic!("unexpected selection entry: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn existing_winner_choices_survive_regeneration() -> anyhow::Result<()> {
        let (_dir, layout, manifest) = project()?;
        let path = layout.selection_path("ep1", "CUT");
        std::fs::create_dir_all(path.parent().unwrap())?;
        std::fs::write(&path, "scenes:\n  s1: 2\n")?;

        let reviews = build_selections(&layout, &manifest)?;
        assert_eq!(reviews[0].scenes[0].winner_index, 2);
        let doc = selection::load(&path).expect("template");
        assert_eq!(selection::resolve_winner(Some(&doc), "s1", 2), 2);
        Ok(())
    }

    #[tokio::test]
    async fn contact_sheet_marks_winner_and_missing_frames() -> anyhow::Result<()> {
        let (_dir, layout, manifest) = project()?;
        let reviews = build_selections(&layout, &manifest)?;
        let transcoder = Transcoder::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe");

        let html = render_contact_sheet(&layout, &transcoder, "CUT", &reviews).await?;
        assert!(html.contains("<h1>Candidate Review: CUT</h1>"));
        assert!(html.contains("Candidate 1 (current winner)"));
        assert!(html.contains("<div class='candidate'>\n<div class='candidate-label'>Candidate 2</div>"));
        assert_eq!(html.matches("no-video'>").count(), 2);
        Ok(())
    }
}
