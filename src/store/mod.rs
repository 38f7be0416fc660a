//! Flat-file JSON persistence
//!
//! Each logical document is an independent JSON file guarded by its own
//! advisory lockfile. Saves are atomic (write to a temp path, then rename)
//! so no reader ever observes a partially written document. Absent files
//! load as typed defaults. There is no cross-document transaction: multi-
//! document operations take each lock in sequence and a crash mid-sequence
//! can leave orphaned comments or metadata, which is tolerated.

pub mod lock;

pub use lock::FileLock;

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{Category, Comment, LlmConfig, Post, PostMetaEntry, PostMetaMap};
use crate::error::Result;
use crate::id::{generate_record_id, now_local_iso};

/// The five persisted documents, each with its own file and lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Doc {
    Posts,
    Categories,
    Comments,
    PostMeta,
    LlmConfig,
}

impl Doc {
    fn file_name(self) -> &'static str {
        match self {
            Doc::Posts => "posts.json",
            Doc::Categories => "categories.json",
            Doc::Comments => "comments.json",
            Doc::PostMeta => "post_meta.json",
            Doc::LlmConfig => "llm_config.json",
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(default)]
struct PostsDoc {
    version: u32,
    posts: Vec<Post>,
}

impl Default for PostsDoc {
    fn default() -> Self {
        Self { version: 1, posts: Vec::new() }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(default)]
struct CategoriesDoc {
    version: u32,
    categories: Vec<Category>,
}

impl Default for CategoriesDoc {
    fn default() -> Self {
        Self { version: 1, categories: Vec::new() }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(default)]
struct CommentsDoc {
    version: u32,
    comments: Vec<Comment>,
}

impl Default for CommentsDoc {
    fn default() -> Self {
        Self { version: 1, comments: Vec::new() }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(default)]
struct PostMetaDoc {
    version: u32,
    meta: PostMetaMap,
}

impl Default for PostMetaDoc {
    fn default() -> Self {
        Self { version: 1, meta: PostMetaMap::new() }
    }
}

/// Typed access to the journal's data directory.
#[derive(Debug, Clone)]
pub struct Store {
    data_dir: PathBuf,
}

impl Store {
    /// Create a store rooted at `data_dir`. The directory is created lazily
    /// on first save.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of a document's backing file.
    pub fn doc_path(&self, doc: Doc) -> PathBuf {
        self.data_dir.join(doc.file_name())
    }

    /// Path of a document's lockfile.
    pub fn lock_path(&self, doc: Doc) -> PathBuf {
        let mut s = self.doc_path(doc).into_os_string();
        s.push(".lock");
        PathBuf::from(s)
    }

    /// Acquire the document's advisory lock. Hold the returned guard across
    /// the whole read-modify-write cycle.
    pub fn lock(&self, doc: Doc) -> Result<FileLock> {
        Ok(FileLock::acquire(self.lock_path(doc))?)
    }

    fn load_json<T: DeserializeOwned + Default>(&self, doc: Doc) -> Result<T> {
        let path = self.doc_path(doc);
        if !path.exists() {
            return Ok(T::default());
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save_json<T: Serialize>(&self, doc: Doc, value: &T) -> Result<()> {
        let path = self.doc_path(doc);
        fs::create_dir_all(&self.data_dir)?;

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn load_posts(&self) -> Result<Vec<Post>> {
        Ok(self.load_json::<PostsDoc>(Doc::Posts)?.posts)
    }

    pub fn save_posts(&self, posts: &[Post]) -> Result<()> {
        self.save_json(Doc::Posts, &PostsDoc { version: 1, posts: posts.to_vec() })
    }

    pub fn load_categories(&self) -> Result<Vec<Category>> {
        Ok(self.load_json::<CategoriesDoc>(Doc::Categories)?.categories)
    }

    pub fn save_categories(&self, categories: &[Category]) -> Result<()> {
        self.save_json(
            Doc::Categories,
            &CategoriesDoc { version: 1, categories: categories.to_vec() },
        )
    }

    pub fn load_comments(&self) -> Result<Vec<Comment>> {
        Ok(self.load_json::<CommentsDoc>(Doc::Comments)?.comments)
    }

    pub fn save_comments(&self, comments: &[Comment]) -> Result<()> {
        self.save_json(
            Doc::Comments,
            &CommentsDoc { version: 1, comments: comments.to_vec() },
        )
    }

    pub fn load_post_meta(&self) -> Result<PostMetaMap> {
        Ok(self.load_json::<PostMetaDoc>(Doc::PostMeta)?.meta)
    }

    pub fn save_post_meta(&self, meta: &PostMetaMap) -> Result<()> {
        self.save_json(Doc::PostMeta, &PostMetaDoc { version: 1, meta: meta.clone() })
    }

    pub fn load_llm_config(&self) -> Result<LlmConfig> {
        self.load_json::<LlmConfig>(Doc::LlmConfig)
    }

    pub fn save_llm_config(&self, config: &LlmConfig) -> Result<()> {
        self.save_json(Doc::LlmConfig, config)
    }

    /// Current edit generation of a post; 0 when no metadata entry exists.
    pub fn post_edit_seq(&self, post_id: &str) -> Result<u64> {
        Ok(self
            .load_post_meta()?
            .get(post_id)
            .map(|m| m.edit_seq)
            .unwrap_or(0))
    }

    /// Append a new post and initialize its metadata entry at edit_seq 0.
    pub fn create_post(
        &self,
        title: impl Into<String>,
        category_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Post> {
        let post = Post {
            id: generate_record_id(),
            title: title.into(),
            category_id: category_id.into(),
            content: content.into(),
            published_at: now_local_iso(),
        };

        {
            let _lock = self.lock(Doc::Posts)?;
            let mut posts = self.load_posts()?;
            posts.push(post.clone());
            self.save_posts(&posts)?;
        }
        {
            let _lock = self.lock(Doc::PostMeta)?;
            let mut meta = self.load_post_meta()?;
            meta.insert(
                post.id.clone(),
                PostMetaEntry {
                    edit_seq: 0,
                    updated_at: now_local_iso(),
                    content_hash: content_hash(&post.content),
                },
            );
            self.save_post_meta(&meta)?;
        }

        Ok(post)
    }

    /// Rewrite a post's fields and bump its edit generation, which resets
    /// the comment quota for every model. Returns false when the post does
    /// not exist.
    pub fn update_post(
        &self,
        post_id: &str,
        title: impl Into<String>,
        category_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<bool> {
        let content = content.into();

        {
            let _lock = self.lock(Doc::Posts)?;
            let mut posts = self.load_posts()?;
            let Some(post) = posts.iter_mut().find(|p| p.id == post_id) else {
                return Ok(false);
            };
            post.title = title.into();
            post.category_id = category_id.into();
            post.content = content.clone();
            self.save_posts(&posts)?;
        }
        {
            let _lock = self.lock(Doc::PostMeta)?;
            let mut meta = self.load_post_meta()?;
            let entry = meta.entry(post_id.to_string()).or_default();
            entry.edit_seq += 1;
            entry.updated_at = now_local_iso();
            entry.content_hash = content_hash(&content);
            self.save_post_meta(&meta)?;
        }

        Ok(true)
    }

    /// Remove a post and cascade to its comments and metadata. Each document
    /// is locked in turn; the cascade is not atomic across documents.
    pub fn delete_post(&self, post_id: &str) -> Result<()> {
        {
            let _lock = self.lock(Doc::Posts)?;
            let mut posts = self.load_posts()?;
            posts.retain(|p| p.id != post_id);
            self.save_posts(&posts)?;
        }
        {
            let _lock = self.lock(Doc::Comments)?;
            let mut comments = self.load_comments()?;
            comments.retain(|c| c.post_id != post_id);
            self.save_comments(&comments)?;
        }
        {
            let _lock = self.lock(Doc::PostMeta)?;
            let mut meta = self.load_post_meta()?;
            meta.remove(post_id);
            self.save_post_meta(&meta)?;
        }

        Ok(())
    }
}

/// Hex SHA-256 of a post's content, kept in its metadata entry.
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}
