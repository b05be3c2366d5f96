use std::path::Path;

use crate::formats::{SceneSelection, SelectionDoc};

/// Load a selection document. A missing, unreadable or malformed file yields
/// `None`; every scene then falls back to candidate 1.
pub fn load(path: &Path) -> Option<SelectionDoc> {
    if !path.exists() {
        return None;
    }
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "unreadable selection file; using defaults");
            return None;
        }
    };
    match serde_yaml::from_str::<Option<SelectionDoc>>(&raw) {
        Ok(doc) => doc,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "malformed selection file; using defaults");
            None
        }
    }
}

/// 1-based winner index for `scene_id`, clamped to `[1, candidate_count]`.
pub fn resolve_winner(doc: Option<&SelectionDoc>, scene_id: &str, candidate_count: usize) -> usize {
    let requested = match doc.and_then(|doc| doc.scenes.get(scene_id)) {
        Some(SceneSelection::Index(index)) => *index,
        Some(SceneSelection::Detailed(detail)) => detail.winner_index.unwrap_or(1),
        Some(SceneSelection::Unrecognized(value)) => {
            tracing::warn!(scene_id, ?value, "unrecognized selection entry; using candidate 1");
            1
        }
        None => 1,
    };

    match usize::try_from(requested) {
        Ok(index) if (1..=candidate_count).contains(&index) => index,
        _ => {
            tracing::warn!(
                scene_id,
                requested,
                candidates = candidate_count,
                "winner index out of range; using candidate 1"
            );
            1
        }
    }
}
