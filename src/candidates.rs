use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;

use crate::config::{ProjectLayout, RenderConfig};
use crate::formats::{CandidateLedger, CandidateRecord, ProviderOptions, Scene};
use crate::provider::Provider;

/// How many takes to generate per scene and which seed each one gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidatePlan {
    pub count: usize,
    pub seed_base: Option<i64>,
}

impl CandidatePlan {
    /// Fails when `seed_base` leaves no room for `num_candidates` seeds.
    pub fn from_options(options: &ProviderOptions) -> anyhow::Result<Self> {
        let plan = Self {
            count: options.num_candidates(),
            seed_base: options.seed_base(),
        };
        plan.seed_for(plan.count)
            .context("invalid provider option seed_base")?;
        Ok(plan)
    }

    /// Candidate indices are 1-based: `seed_base + i`, or `i` without a base.
    pub fn seed_for(&self, index: usize) -> anyhow::Result<i64> {
        let offset = i64::try_from(index)
            .map_err(|_| anyhow::anyhow!("candidate index {index} out of range"))?;
        match self.seed_base {
            Some(base) => base.checked_add(offset).ok_or_else(|| {
                anyhow::anyhow!("seed_base {base} + candidate index {index} overflows a 64-bit seed")
            }),
            None => Ok(offset),
        }
    }
}

pub struct CandidateManager {
    provider: Arc<dyn Provider>,
    layout: ProjectLayout,
    plan: CandidatePlan,
    concurrency: usize,
}

impl CandidateManager {
    pub fn new(
        provider: Arc<dyn Provider>,
        layout: ProjectLayout,
        plan: CandidatePlan,
        concurrency: usize,
    ) -> Self {
        Self {
            provider,
            layout,
            plan,
            concurrency: concurrency.max(1),
        }
    }

    /// Generate every candidate of `scene`, then persist the scene ledger.
    /// The ledger is written once, after all candidates have finished.
    pub async fn generate(
        &self,
        cut_id: &str,
        episode_id: &str,
        scene: &Scene,
        render: &RenderConfig,
    ) -> anyhow::Result<CandidateLedger> {
        let total = self.plan.count.max(1);
        let concurrency = self.concurrency.min(total);
        let duration_sec = scene.duration_or(1.0);

        let mut join_set = tokio::task::JoinSet::new();
        let mut next_index = 1usize;
        let mut records: Vec<Option<CandidateRecord>> = vec![None; total];

        while next_index <= total || !join_set.is_empty() {
            while next_index <= total && join_set.len() < concurrency {
                let index = next_index;
                let seed = self.plan.seed_for(index)?;
                let output_dir = self.layout.candidate_dir(cut_id, episode_id, &scene.id, index);
                let provider = Arc::clone(&self.provider);
                let scene = scene.clone();
                let render = render.clone();
                let episode_id = episode_id.to_owned();

                join_set.spawn(async move {
                    tracing::debug!(
                        provider = provider.name(),
                        episode_id = %episode_id,
                        scene_id = %scene.id,
                        index,
                        seed,
                        "generate candidate"
                    );
                    let clip = provider
                        .generate_scene(&episode_id, &scene, &output_dir, &render, Some(seed))
                        .await
                        .with_context(|| format!("generate candidate {index} of scene {}", scene.id));
                    (index, seed, clip)
                });
                next_index += 1;
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };
            let (index, seed, clip) = joined.context("join candidate task")?;
            let clip = clip?;
            records[index - 1] = Some(CandidateRecord {
                index,
                seed,
                path: self.layout.relative(&clip),
                duration_sec,
            });
        }

        let candidates = records
            .into_iter()
            .enumerate()
            .map(|(idx, record)| {
                record.ok_or_else(|| anyhow::anyhow!("candidate {} did not complete", idx + 1))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let ledger = CandidateLedger {
            scene_id: scene.id.clone(),
            candidates,
        };
        let ledger_path = self.layout.ledger_path(cut_id, episode_id, &scene.id);
        write_json_atomic(&ledger_path, &ledger)?;
        tracing::info!(
            episode_id,
            scene_id = %scene.id,
            candidates = ledger.candidates.len(),
            ledger = %ledger_path.display(),
            "candidates ready"
        );
        Ok(ledger)
    }
}

/// Write pretty JSON through a temp file in the same directory, then rename.
pub fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("create parent dir: {}", parent.display()))?;

    let data = serde_json::to_vec_pretty(value).context("serialize json")?;
    let tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("create tmp in: {}", parent.display()))?;
    std::fs::write(tmp.path(), &data)
        .with_context(|| format!("write tmp: {}", tmp.path().display()))?;
    tmp.persist(path)
        .map_err(|err| anyhow::anyhow!("rename tmp to final: {}: {}", path.display(), err.error))?;
    Ok(())
}
