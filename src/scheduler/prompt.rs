//! Prompt construction
//!
//! Shared by the background loop and the on-demand "comment now" path. The
//! payload is deterministic given its inputs; the only randomness is which
//! active preset gets picked.

use rand::seq::IndexedRandom;
use serde_json::json;
use std::collections::HashSet;

use crate::domain::{Category, LlmConfig, Post, PromptPreset};

/// Instruction used when no preset supplies a user prefix.
const DEFAULT_USER_PREFIX: &str = "Please read my note and share your thoughts on it.";

/// A (system prompt, user prompt) pair ready for a generate call.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user_prompt: String,
}

/// Resolve a category id to its display name, falling back to the id when
/// the category is missing or unnamed.
pub fn category_name(categories: &[Category], category_id: &str) -> String {
    categories
        .iter()
        .find(|c| c.id == category_id)
        .filter(|c| !c.name.is_empty())
        .map(|c| c.name.clone())
        .unwrap_or_else(|| category_id.to_string())
}

fn choose_preset(config: &LlmConfig) -> Option<&PromptPreset> {
    let ids = config.active_preset_ids();
    if !ids.is_empty() {
        let id_set: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let candidates: Vec<&PromptPreset> = config
            .prompt_presets
            .iter()
            .filter(|p| id_set.contains(p.id.as_str()))
            .collect();
        if let Some(preset) = candidates.choose(&mut rand::rng()) {
            return Some(preset);
        }
    }
    config.prompt_presets.first()
}

/// Build the prompt for one post. `edit_seq` is the post's current edit
/// generation as seen by the caller.
pub fn build_prompt(
    config: &LlmConfig,
    post: &Post,
    categories: &[Category],
    edit_seq: u64,
) -> Prompt {
    let (system, prefix) = match choose_preset(config) {
        Some(preset) => {
            let prefix = if preset.user_prefix.is_empty() {
                DEFAULT_USER_PREFIX.to_string()
            } else {
                preset.user_prefix.clone()
            };
            (preset.system.clone(), prefix)
        }
        None => (String::new(), DEFAULT_USER_PREFIX.to_string()),
    };

    let payload = json!({
        "title": post.title,
        "category_id": post.category_id,
        "category_name": category_name(categories, &post.category_id),
        "published_at": post.published_at,
        "edit_seq": edit_seq,
        "content": post.content,
    });

    let user_prompt = format!(
        "{prefix}\n\nComment on the note described by the JSON below; do not ignore any field:\n{}\n",
        serde_json::to_string_pretty(&payload).unwrap_or_default()
    );

    Prompt { system, user_prompt }
}
