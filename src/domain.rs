//! Domain records persisted by the store
//!
//! Field names mirror the on-disk JSON documents exactly; existing data
//! files written by the web layer must load unchanged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A journal note
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Post {
    pub id: String,
    pub title: String,
    /// On-disk name is `category`, kept for file-layout compatibility.
    #[serde(rename = "category")]
    pub category_id: String,
    pub content: String,
    pub published_at: String,
}

/// A post category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub color: String,
}

/// A model-generated comment on a post
///
/// Immutable once created, except for the `read` flag flipped by the
/// notification UI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    /// The post's edit generation at the moment the comment was recorded.
    /// Quota counting joins on this field.
    pub post_edit_seq: u64,
    pub model: String,
    pub content: String,
    pub created_at: String,
    pub read: bool,
}

/// Per-post edit metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostMetaEntry {
    /// Starts at 0 on creation, +1 on every content-affecting edit.
    pub edit_seq: u64,
    pub updated_at: String,
    pub content_hash: String,
}

/// post_id -> metadata entry
pub type PostMetaMap = BTreeMap<String, PostMetaEntry>;

/// How the scheduler picks among eligible posts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickMode {
    /// Prefer a random never-commented post, else a random eligible one
    #[default]
    RandomUncommentedFirst,
    /// Always the newest eligible post
    Latest,
}

/// A named (system prompt, user prefix) pair for prompt construction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptPreset {
    pub id: String,
    pub name: String,
    pub system: String,
    pub user_prefix: String,
}

/// The singleton LLM configuration document
///
/// Mutated only by the settings UI; the core re-reads it on every tick
/// and never caches it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub version: u32,
    pub auto_enabled: bool,
    pub server: String,
    pub port: u16,
    pub allowed_models: Vec<String>,
    pub default_interval_minutes: u64,
    pub interval_minutes_by_model: BTreeMap<String, u64>,
    pub max_comments_per_post_default: u32,
    pub max_comments_per_post_by_model: BTreeMap<String, u32>,
    pub random_pick_mode: PickMode,
    /// Hard wall-clock timeout for one generate call, in seconds.
    pub timeout_sec: u64,
    pub prompt_presets: Vec<PromptPreset>,
    /// Legacy single-select field, comma-separated. Superseded by
    /// `active_prompt_preset_ids` but still honored when that is empty.
    pub active_prompt_preset_id: String,
    pub active_prompt_preset_ids: Vec<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            version: 1,
            auto_enabled: true,
            server: "127.0.0.1".to_string(),
            port: 11434,
            allowed_models: Vec::new(),
            default_interval_minutes: 120,
            interval_minutes_by_model: BTreeMap::new(),
            max_comments_per_post_default: 2,
            max_comments_per_post_by_model: BTreeMap::new(),
            random_pick_mode: PickMode::default(),
            timeout_sec: 300,
            prompt_presets: Vec::new(),
            active_prompt_preset_id: String::new(),
            active_prompt_preset_ids: Vec::new(),
        }
    }
}

impl LlmConfig {
    /// Per-model interval override, else the default interval
    pub fn interval_minutes_for(&self, model: &str) -> u64 {
        self.interval_minutes_by_model
            .get(model)
            .copied()
            .unwrap_or(self.default_interval_minutes)
    }

    /// Per-model comment quota override, else the default quota
    pub fn quota_for(&self, model: &str) -> u32 {
        self.max_comments_per_post_by_model
            .get(model)
            .copied()
            .unwrap_or(self.max_comments_per_post_default)
    }

    /// Active preset ids, falling back to the legacy comma-separated field
    pub fn active_preset_ids(&self) -> Vec<String> {
        if !self.active_prompt_preset_ids.is_empty() {
            return self.active_prompt_preset_ids.clone();
        }
        self.active_prompt_preset_id
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}
