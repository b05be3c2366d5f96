use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde_json::Value;

use crate::address::CutAddress;
use crate::candidates::{CandidateManager, CandidatePlan, write_json_atomic};
use crate::cli::CompileArgs;
use crate::config::{ProjectLayout, RenderConfig, SeriesConfig};
use crate::episode::{self, EpisodeCompiler, EpisodeOutcome, RunMode};
use crate::formats::{CutManifest, EpisodeOutput, Recipe, RenderSummary};
use crate::provider;
use crate::schema::RecipeSchema;
use crate::transcode::Transcoder;

/// A recipe as read from disk (`raw`, used for hashing and the snapshot) and
/// its typed view.
#[derive(Debug, Clone)]
pub struct LoadedRecipe {
    pub raw: Value,
    pub recipe: Recipe,
}

/// Read, validate, then parse. Nothing is written before validation passes.
pub fn load_recipe(path: &Path, schema: &RecipeSchema) -> anyhow::Result<LoadedRecipe> {
    if !path.exists() {
        anyhow::bail!("recipe not found: {}", path.display());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read recipe: {}", path.display()))?;
    let raw: Value = serde_yaml::from_str(&text)
        .with_context(|| format!("parse recipe yaml: {}", path.display()))?;

    schema.validate(&raw)?;

    let recipe: Recipe = serde_json::from_value(raw.clone())
        .with_context(|| format!("decode recipe: {}", path.display()))?;
    Ok(LoadedRecipe { raw, recipe })
}

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub root: PathBuf,
    pub mode: RunMode,
    pub concurrency: usize,
    pub font_path: Option<String>,
    pub schema_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CompileReport {
    pub manifest_path: PathBuf,
    pub manifest: CutManifest,
}

pub async fn compile_cut(
    recipe_path: &Path,
    options: &CompileOptions,
    transcoder: Transcoder,
) -> anyhow::Result<CompileReport> {
    let schema = RecipeSchema::load(options.schema_path.as_deref())?;
    let LoadedRecipe { raw, recipe } = load_recipe(recipe_path, &schema)?;

    let layout = ProjectLayout::new(&options.root);
    let address = CutAddress::for_recipe(&raw, &recipe);
    let cut_id = address.cut_id.clone();
    tracing::info!(cut_id = %cut_id, cut_uri = %address.cut_uri, mode = ?options.mode, "compile cut");

    let series = SeriesConfig::load(&layout)?;
    let render = RenderConfig::resolve(&recipe.render, &series)?;
    let provider = provider::from_selection(&recipe.provider, &layout, transcoder.clone())?;
    let plan = CandidatePlan::from_options(&recipe.provider.options)?;

    let manifests = recipe
        .scope
        .include_episodes
        .iter()
        .map(|episode_id| {
            episode::load_manifest(&layout, episode_id)
                .map(|manifest| (episode_id.clone(), manifest))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    transcoder.preflight()?;

    let compiler = EpisodeCompiler {
        candidates: CandidateManager::new(
            provider,
            layout.clone(),
            plan,
            options.concurrency,
        ),
        layout: layout.clone(),
        transcoder,
        render: render.clone(),
        series,
        overlays: recipe.overlays.clone(),
        font_path: options.font_path.clone(),
        cut_id: cut_id.clone(),
        mode: options.mode,
    };

    let mut episodes = Vec::new();
    for (episode_id, manifest) in &manifests {
        let outcome = compiler
            .compile(episode_id, manifest)
            .await
            .with_context(|| format!("episode {episode_id}"))?;
        if let EpisodeOutcome::Compiled {
            video_path,
            captions,
        } = outcome
        {
            episodes.push(EpisodeOutput {
                episode_id: episode_id.clone(),
                video_path: layout.relative(&video_path),
                captions,
            });
        }
    }

    let candidates_root = match options.mode {
        RunMode::CandidatesOnly => Some(layout.relative(&layout.candidates_root(&cut_id))),
        RunMode::Normal => None,
    };

    let manifest = CutManifest {
        cut_id: cut_id.clone(),
        cut_uri: address.cut_uri,
        recipe_hash: cut_id.clone(),
        commit_sha: address.commit_sha,
        timeline: recipe.timeline().to_owned(),
        recipe_snapshot: raw,
        episodes,
        render: RenderSummary {
            fps: render.fps,
            resolution: render.resolution,
            aspect: render.aspect,
        },
        created: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        candidates_root,
    };

    let manifest_path = layout.cut_manifest_path(&cut_id);
    write_json_atomic(&manifest_path, &manifest)
        .with_context(|| format!("write cut manifest: {}", manifest_path.display()))?;
    tracing::info!(manifest = %manifest_path.display(), episodes = manifest.episodes.len(), "cut manifest written");

    Ok(CompileReport {
        manifest_path,
        manifest,
    })
}

pub async fn run(args: CompileArgs) -> anyhow::Result<()> {
    let options = CompileOptions {
        root: PathBuf::from(&args.root),
        mode: if args.candidates_only {
            RunMode::CandidatesOnly
        } else {
            RunMode::Normal
        },
        concurrency: args.concurrency,
        font_path: args.font.clone(),
        schema_path: args.schema.clone(),
    };

    let report = compile_cut(Path::new(&args.recipe), &options, Transcoder::from_env()).await?;
    let manifest = &report.manifest;

    println!("{}", manifest.cut_uri);
    println!("manifest: {}", report.manifest_path.display());
    match manifest.candidates_root.as_deref() {
        Some(root) => println!("candidates: {root}"),
        None => {
            for episode in &manifest.episodes {
                println!("episode {}: {}", episode.episode_id, episode.video_path);
            }
        }
    }
    Ok(())
}
