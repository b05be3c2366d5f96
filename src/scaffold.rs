use std::path::Path;

use anyhow::Context as _;
use serde_yaml::{Mapping, Value};

use crate::cli::NewCutArgs;

/// Copy `base` with `metadata.title` and `metadata.created` replaced.
/// Key order of the base recipe is preserved.
pub fn scaffold_recipe(base: &Value, title: &str, created: &str) -> anyhow::Result<Value> {
    let mut recipe = base.clone();
    let root = recipe
        .as_mapping_mut()
        .ok_or_else(|| anyhow::anyhow!("base recipe must be a mapping"))?;

    let metadata = root
        .entry(Value::from("metadata"))
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    if !metadata.is_mapping() {
        *metadata = Value::Mapping(Mapping::new());
    }
    let Some(metadata) = metadata.as_mapping_mut() else {
        anyhow::bail!("recipe metadata must be a mapping");
    };
    metadata.insert(Value::from("title"), Value::from(title));
    metadata.insert(Value::from("created"), Value::from(created));
    Ok(recipe)
}

pub fn run(args: NewCutArgs) -> anyhow::Result<()> {
    let out = Path::new(&args.out);
    if out.exists() && !args.force {
        anyhow::bail!(
            "output already exists: {} (use --force to overwrite)",
            out.display()
        );
    }

    let raw = std::fs::read_to_string(&args.from)
        .with_context(|| format!("read base recipe: {}", args.from))?;
    let base: Value = serde_yaml::from_str(&raw)
        .with_context(|| format!("parse base recipe: {}", args.from))?;

    let created = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let recipe = scaffold_recipe(&base, &args.title, &created)?;

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir: {}", parent.display()))?;
    }
    let text = serde_yaml::to_string(&recipe).context("serialize recipe")?;
    std::fs::write(out, text).with_context(|| format!("write recipe: {}", out.display()))?;

    tracing::info!(from = %args.from, out = %out.display(), "new cut recipe scaffolded");
    println!("{}", out.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sets_title_and_created_keeping_other_fields() -> anyhow::Result<()> {
        let base: Value = serde_yaml::from_str(
            "schema_version: 0.1.0\nmetadata:\n  title: Old\n  timeline: Prime\nscope:\n  include_episodes: [ep1]\n",
        )?;
        let recipe = scaffold_recipe(&base, "Holiday", "2025-12-01T00:00:00Z")?;

        assert_eq!(recipe["metadata"]["title"], Value::from("Holiday"));
        assert_eq!(recipe["metadata"]["created"], Value::from("2025-12-01T00:00:00Z"));
        assert_eq!(recipe["metadata"]["timeline"], Value::from("Prime"));
        assert_eq!(recipe["scope"], base["scope"]);

        let keys = recipe
            .as_mapping()
            .unwrap()
            .keys()
            .filter_map(|k| k.as_str())
            .collect::<Vec<_>>();
        assert_eq!(keys, vec!["schema_version", "metadata", "scope"]);
        Ok(())
    }

    #[test]
    fn adds_metadata_when_missing_or_scalar() -> anyhow::Result<()> {
        for yaml in ["scope: {}\n", "metadata: null\n"] {
            let base: Value = serde_yaml::from_str(yaml)?;
            let recipe = scaffold_recipe(&base, "T", "now")?;
            assert_eq!(recipe["metadata"]["title"], Value::from("T"));
        }
        Ok(())
    }

    #[test]
    fn rejects_non_mapping_base() {
        let base = Value::from("just a string");
        assert!(scaffold_recipe(&base, "T", "now").is_err());
    }
}
