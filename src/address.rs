use std::path::PathBuf;

use anyhow::Context as _;
use serde_json::Value;

use crate::canonical::{canonical_bytes, canonicalize};
use crate::cli::HashArgs;
use crate::formats::Recipe;

/// Length of a cut id in base32 characters (50 bits of the digest).
pub const CUT_ID_LEN: usize = 10;

pub const CUT_URI_SCHEME: &str = "chcut";

pub const CUT_URI_VERSION: &str = "0.1";

/// Content identity of a recipe: BLAKE3 over the canonical encoding, base32,
/// padding dropped, truncated to [`CUT_ID_LEN`].
pub fn compute_hash(recipe: &Value) -> String {
    let canonical = canonicalize(recipe);
    let digest = blake3::hash(&canonical_bytes(&canonical));
    let encoded = data_encoding::BASE32.encode(digest.as_bytes());
    encoded
        .trim_end_matches('=')
        .chars()
        .take(CUT_ID_LEN)
        .collect()
}

pub fn build_uri(commit_sha: &str, cut_id: &str, audience: &str, version: &str) -> String {
    format!("{CUT_URI_SCHEME}://{commit_sha}/{cut_id}?audience={audience}&v={version}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutAddress {
    pub cut_id: String,
    pub cut_uri: String,
    pub commit_sha: String,
}

impl CutAddress {
    /// `raw` is the recipe document as loaded; `recipe` its typed view.
    pub fn for_recipe(raw: &Value, recipe: &Recipe) -> Self {
        let cut_id = compute_hash(raw);
        let commit_sha = recipe.commit_sha().to_owned();
        let cut_uri = build_uri(
            &commit_sha,
            &cut_id,
            recipe.audience_profile.as_str(),
            CUT_URI_VERSION,
        );
        Self {
            cut_id,
            cut_uri,
            commit_sha,
        }
    }
}

pub fn run(args: HashArgs) -> anyhow::Result<()> {
    let recipe_path = PathBuf::from(&args.recipe);
    let schema = crate::schema::RecipeSchema::load(args.schema.as_deref())?;
    let loaded = crate::compile::load_recipe(&recipe_path, &schema).context("load recipe")?;
    let address = CutAddress::for_recipe(&loaded.raw, &loaded.recipe);

    tracing::debug!(cut_id = %address.cut_id, "computed cut id");
    println!("{}", address.cut_id);
    println!("{}", address.cut_uri);
    Ok(())
}
