//! Post selection policy
//!
//! Given a model and the current comment history, picks the note the model
//! comments on next. Quota counting is scoped to a post's current edit
//! generation: editing a post starts a fresh bucket, so prior comments no
//! longer count against the quota.

use rand::seq::IndexedRandom;

use crate::domain::{Comment, LlmConfig, PickMode, Post, PostMetaMap};

/// Comments a model has left on a post at a given edit generation.
pub fn comment_count(comments: &[Comment], post_id: &str, model: &str, edit_seq: u64) -> usize {
    comments
        .iter()
        .filter(|c| c.post_id == post_id && c.model == model && c.post_edit_seq == edit_seq)
        .count()
}

/// Pick an eligible post for `model`, or None when every post has reached
/// its quota. None is "nothing to do", not an error.
pub fn pick_post(
    posts: &[Post],
    comments: &[Comment],
    meta: &PostMetaMap,
    config: &LlmConfig,
    model: &str,
) -> Option<Post> {
    if posts.is_empty() {
        return None;
    }

    // Newest first: candidate order for filtering and the answer in
    // "latest" mode.
    let mut sorted: Vec<&Post> = posts.iter().collect();
    sorted.sort_by(|a, b| b.published_at.cmp(&a.published_at));

    let quota = config.quota_for(model) as usize;
    let edit_seq_of = |p: &Post| meta.get(&p.id).map(|m| m.edit_seq).unwrap_or(0);
    let count_of = |p: &Post| comment_count(comments, &p.id, model, edit_seq_of(p));

    let eligible: Vec<&Post> = sorted.into_iter().filter(|p| count_of(p) < quota).collect();
    if eligible.is_empty() {
        return None;
    }

    if config.random_pick_mode == PickMode::Latest {
        return Some(eligible[0].clone());
    }

    // Default mode: prefer posts this model has never commented on at
    // their current edit generation.
    let never_commented: Vec<&Post> = eligible
        .iter()
        .copied()
        .filter(|p| count_of(p) == 0)
        .collect();
    let pool = if never_commented.is_empty() {
        &eligible
    } else {
        &never_commented
    };

    pool.choose(&mut rand::rng()).map(|p| (*p).clone())
}
