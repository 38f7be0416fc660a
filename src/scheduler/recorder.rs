//! Comment recorder
//!
//! Appends a generated comment under the comments lock, stamped with the
//! post's current edit generation.

use crate::domain::Comment;
use crate::error::Result;
use crate::id::{generate_record_id, now_local_iso};
use crate::store::{Doc, Store};

/// Append a comment for `post_id` and return the new comment's id.
pub fn record_comment(store: &Store, post_id: &str, model: &str, content: &str) -> Result<String> {
    let comment_id = generate_record_id();

    let _lock = store.lock(Doc::Comments)?;
    // Re-read the edit generation at record time; selection and recording
    // are not atomic with respect to concurrent edits.
    let edit_seq = store.post_edit_seq(post_id)?;

    let mut comments = store.load_comments()?;
    comments.push(Comment {
        id: comment_id.clone(),
        post_id: post_id.to_string(),
        post_edit_seq: edit_seq,
        model: model.to_string(),
        content: content.trim().to_string(),
        created_at: now_local_iso(),
        read: false,
    });
    store.save_comments(&comments)?;

    Ok(comment_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_record_stamps_current_edit_seq() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        let post = store.create_post("t", "c", "v1").unwrap();

        let id1 = record_comment(&store, &post.id, "m", "first").unwrap();
        store.update_post(&post.id, "t", "c", "v2").unwrap();
        let id2 = record_comment(&store, &post.id, "m", "second").unwrap();

        let comments = store.load_comments().unwrap();
        assert_eq!(comments.len(), 2);
        let first = comments.iter().find(|c| c.id == id1).unwrap();
        let second = comments.iter().find(|c| c.id == id2).unwrap();
        assert_eq!(first.post_edit_seq, 0);
        assert_eq!(second.post_edit_seq, 1);
        assert!(!first.read);
    }

    #[test]
    fn test_record_trims_content() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        let post = store.create_post("t", "c", "x").unwrap();

        record_comment(&store, &post.id, "m", "  spaced out \n").unwrap();
        let comments = store.load_comments().unwrap();
        assert_eq!(comments[0].content, "spaced out");
    }

    #[test]
    fn test_record_for_unknown_post_uses_seq_zero() {
        // An orphaned comment is tolerated; its edit generation defaults
        // to 0 when no metadata exists.
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());

        record_comment(&store, "ghost", "m", "hello").unwrap();
        let comments = store.load_comments().unwrap();
        assert_eq!(comments[0].post_edit_seq, 0);
    }

    #[test]
    fn test_concurrent_recorders_lose_nothing() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());

        let posts: Vec<String> = (0..8)
            .map(|i| {
                store
                    .create_post(format!("t{i}"), "c", "x")
                    .unwrap()
                    .id
            })
            .collect();

        let handles: Vec<_> = posts
            .into_iter()
            .map(|post_id| {
                let store = store.clone();
                thread::spawn(move || record_comment(&store, &post_id, "m", "hi").unwrap())
            })
            .collect();

        let ids: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let comments = store.load_comments().unwrap();
        assert_eq!(comments.len(), 8);
        for id in ids {
            assert!(comments.iter().any(|c| c.id == id));
        }
    }
}
