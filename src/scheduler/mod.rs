//! Autonomous comment scheduler
//!
//! A long-lived tick loop that, per allowed model, tracks when the next
//! generation attempt is due, runs selection → prompt → generate → record
//! when it is, and reacts to configuration changes without restart. The
//! configuration document is re-read every tick, never cached. No failure
//! in a single run ever terminates the loop; only an explicit stop does.

pub mod policy;
pub mod prompt;
pub mod recorder;
mod schedule;

pub use policy::{comment_count, pick_post};
pub use prompt::{Prompt, build_prompt, category_name};
pub use recorder::record_comment;
pub use schedule::SchedulerTiming;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rand::seq::IndexedRandom;
use tokio::task::JoinHandle;

use crate::domain::LlmConfig;
use crate::error::{MarginaliaError, Result};
use crate::llm::{GenerateRequest, GenerationClient};
use crate::store::Store;
use schedule::Schedule;

/// What one successful generation attempt produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub post_id: String,
    pub comment_id: String,
    pub model: String,
}

/// The background comment scheduler.
///
/// Explicitly constructed and handle-owned: it carries its own stop flag
/// and schedule map, with no process-global state. `start` spawns the loop
/// once; `stop` is cooperative and takes effect at the next tick check.
pub struct CommentScheduler {
    store: Store,
    client: Arc<dyn GenerationClient>,
    timing: SchedulerTiming,
    stop: AtomicBool,
    running: AtomicBool,
}

impl CommentScheduler {
    pub fn new(store: Store, client: Arc<dyn GenerationClient>) -> Arc<Self> {
        Self::with_timing(store, client, SchedulerTiming::default())
    }

    /// Construct with explicit timing. Tests use this to shrink the tick
    /// and stagger windows.
    pub fn with_timing(
        store: Store,
        client: Arc<dyn GenerationClient>,
        timing: SchedulerTiming,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            client,
            timing,
            stop: AtomicBool::new(false),
            running: AtomicBool::new(false),
        })
    }

    /// Spawn the background loop. Returns None when the loop is already
    /// running (a reloading supervisor may call start twice).
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.running.swap(true, Ordering::SeqCst) {
            log::warn!("scheduler already running, ignoring start");
            return None;
        }
        self.stop.store(false, Ordering::SeqCst);

        let this = Arc::clone(self);
        Some(tokio::spawn(async move {
            this.run_loop().await;
            this.running.store(false, Ordering::SeqCst);
        }))
    }

    /// Request a cooperative stop. An in-flight generation attempt is not
    /// cancelled; the loop exits at its next tick check.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn run_loop(&self) {
        log::info!("comment scheduler started");
        let mut schedule = Schedule::new(self.timing.clone());

        while !self.stop.load(Ordering::SeqCst) {
            let config = match self.store.load_llm_config() {
                Ok(c) => c,
                Err(e) => {
                    log::warn!("failed to load llm config: {e}");
                    tokio::time::sleep(self.timing.tick).await;
                    continue;
                }
            };

            if !config.auto_enabled {
                schedule.note_disabled();
                tokio::time::sleep(self.timing.tick).await;
                continue;
            }

            let models = self.allowed_models(&config).await;
            if models.is_empty() {
                tokio::time::sleep(self.timing.no_models_backoff).await;
                continue;
            }

            schedule.note_enabled();

            let now = Instant::now();
            schedule.ensure_scheduled(&models, now);
            schedule.prune(&models);

            for model in &models {
                if self.stop.load(Ordering::SeqCst) {
                    break;
                }
                if !schedule.is_due(model, now) {
                    continue;
                }

                match self.run_once_for_model(model).await {
                    Ok(outcome) => log::info!(
                        "model {} commented on post {} (comment {})",
                        outcome.model,
                        outcome.post_id,
                        outcome.comment_id
                    ),
                    Err(e) if e.is_idle() => log::debug!("model {model}: {e}"),
                    Err(e) => log::warn!("model {model}: {e}"),
                }

                // Reschedule from the time the attempt finished, not the
                // tick that triggered it.
                schedule.reschedule(model, config.interval_minutes_for(model), Instant::now());
            }

            tokio::time::sleep(self.timing.tick).await;
        }

        log::info!("comment scheduler stopped");
    }

    /// Server-reported models filtered by the allow-list. An empty
    /// allow-list admits everything the server reports. When listing
    /// fails, falls back to the allow-list as configured.
    pub async fn allowed_models(&self, config: &LlmConfig) -> Vec<String> {
        match self.client.list_models(&config.server, config.port).await {
            Ok(all) => {
                if config.allowed_models.is_empty() {
                    all
                } else {
                    all.into_iter()
                        .filter(|m| config.allowed_models.contains(m))
                        .collect()
                }
            }
            Err(e) => {
                log::debug!("model listing failed, using configured allow-list: {e}");
                config.allowed_models.clone()
            }
        }
    }

    /// One synchronous generation attempt: selection → prompt → generate →
    /// record. All failures are local and recoverable; on-demand callers
    /// surface them, the background loop absorbs them.
    pub async fn run_once_for_model(&self, model: &str) -> Result<RunOutcome> {
        let config = self.store.load_llm_config()?;

        let posts = self.store.load_posts()?;
        let comments = self.store.load_comments()?;
        let meta = self.store.load_post_meta()?;

        let post = pick_post(&posts, &comments, &meta, &config, model)
            .ok_or(MarginaliaError::NoEligiblePost)?;

        let categories = self.store.load_categories()?;
        let edit_seq = meta.get(&post.id).map(|m| m.edit_seq).unwrap_or(0);
        let prompt = build_prompt(&config, &post, &categories, edit_seq);

        let request = GenerateRequest {
            server: config.server.clone(),
            port: config.port,
            model: model.to_string(),
            system: prompt.system,
            prompt: prompt.user_prompt,
            hard_timeout: Duration::from_secs(config.timeout_sec),
        };

        let text = self.client.generate(&request).await?;
        if text.trim().is_empty() {
            return Err(MarginaliaError::EmptyResponse);
        }

        let comment_id = record_comment(&self.store, &post.id, model, &text)?;

        Ok(RunOutcome {
            post_id: post.id,
            comment_id,
            model: model.to_string(),
        })
    }

    /// Random choice among the allowed models, for on-demand commenting
    /// without an explicit model.
    pub async fn pick_random_model(&self) -> Result<String> {
        let config = self.store.load_llm_config()?;
        let models = self.allowed_models(&config).await;
        models
            .choose(&mut rand::rng())
            .cloned()
            .ok_or(MarginaliaError::NoAllowedModels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    enum MockResponse {
        Text(&'static str),
        Empty,
        Fail,
    }

    struct MockClient {
        models: Vec<String>,
        list_fails: bool,
        response: MockResponse,
        generate_calls: AtomicUsize,
    }

    impl MockClient {
        fn with_text(models: &[&str], text: &'static str) -> Arc<Self> {
            Arc::new(Self {
                models: models.iter().map(|s| s.to_string()).collect(),
                list_fails: false,
                response: MockResponse::Text(text),
                generate_calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.generate_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationClient for MockClient {
        async fn list_models(&self, _server: &str, _port: u16) -> Result<Vec<String>> {
            if self.list_fails {
                return Err(MarginaliaError::ConnectionFailed("mock down".to_string()));
            }
            Ok(self.models.clone())
        }

        async fn generate(&self, _request: &GenerateRequest) -> Result<String> {
            self.generate_calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                MockResponse::Text(t) => Ok(t.to_string()),
                MockResponse::Empty => Ok(String::new()),
                MockResponse::Fail => {
                    Err(MarginaliaError::GenerationFailed("mock error".to_string()))
                }
            }
        }
    }

    fn store_with_post() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        store.create_post("Title", "cat", "content").unwrap();
        (dir, store)
    }

    fn fast_timing() -> SchedulerTiming {
        SchedulerTiming {
            tick: Duration::from_millis(20),
            no_models_backoff: Duration::from_millis(20),
            first_run_min: Duration::from_millis(20),
            first_run_max: Duration::from_millis(60),
            reschedule_jitter_max: Duration::from_millis(20),
            ..SchedulerTiming::default()
        }
    }

    async fn wait_for_calls(client: &MockClient, at_least: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while client.calls() < at_least {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_run_once_records_comment() {
        let (_dir, store) = store_with_post();
        let client = MockClient::with_text(&["m"], "What a lovely note.");
        let scheduler = CommentScheduler::new(store.clone(), client);

        let outcome = scheduler.run_once_for_model("m").await.unwrap();
        assert_eq!(outcome.model, "m");

        let comments = store.load_comments().unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].id, outcome.comment_id);
        assert_eq!(comments[0].post_id, outcome.post_id);
        assert_eq!(comments[0].content, "What a lovely note.");
        assert_eq!(comments[0].post_edit_seq, 0);
    }

    #[tokio::test]
    async fn test_quota_exhausts_after_two_runs() {
        // Default quota is 2: calls 1 and 2 succeed, call 3 finds nothing.
        let (_dir, store) = store_with_post();
        let client = MockClient::with_text(&["m"], "ok");
        let scheduler = CommentScheduler::new(store.clone(), client);

        scheduler.run_once_for_model("m").await.unwrap();
        scheduler.run_once_for_model("m").await.unwrap();
        let err = scheduler.run_once_for_model("m").await.unwrap_err();
        assert!(matches!(err, MarginaliaError::NoEligiblePost));

        assert_eq!(store.load_comments().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_edit_reopens_quota() {
        let (_dir, store) = store_with_post();
        let client = MockClient::with_text(&["m"], "ok");
        let scheduler = CommentScheduler::new(store.clone(), client);

        scheduler.run_once_for_model("m").await.unwrap();
        scheduler.run_once_for_model("m").await.unwrap();
        assert!(scheduler.run_once_for_model("m").await.is_err());

        let post_id = store.load_posts().unwrap()[0].id.clone();
        store.update_post(&post_id, "Title", "cat", "revised").unwrap();

        let outcome = scheduler.run_once_for_model("m").await.unwrap();
        let comments = store.load_comments().unwrap();
        let new_comment = comments.iter().find(|c| c.id == outcome.comment_id).unwrap();
        assert_eq!(new_comment.post_edit_seq, 1);
    }

    #[tokio::test]
    async fn test_empty_response_records_nothing() {
        let (_dir, store) = store_with_post();
        let client = Arc::new(MockClient {
            models: vec!["m".to_string()],
            list_fails: false,
            response: MockResponse::Empty,
            generate_calls: AtomicUsize::new(0),
        });
        let scheduler = CommentScheduler::new(store.clone(), client);

        let err = scheduler.run_once_for_model("m").await.unwrap_err();
        assert!(matches!(err, MarginaliaError::EmptyResponse));
        assert!(store.load_comments().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_records_nothing() {
        let (_dir, store) = store_with_post();
        let client = Arc::new(MockClient {
            models: vec!["m".to_string()],
            list_fails: false,
            response: MockResponse::Fail,
            generate_calls: AtomicUsize::new(0),
        });
        let scheduler = CommentScheduler::new(store.clone(), client);

        let err = scheduler.run_once_for_model("m").await.unwrap_err();
        assert!(matches!(err, MarginaliaError::GenerationFailed(_)));
        assert!(store.load_comments().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_allowed_models_intersects_allow_list() {
        let (_dir, store) = store_with_post();
        let client = MockClient::with_text(&["a", "b", "c"], "ok");
        let scheduler = CommentScheduler::new(store, client);

        let mut config = LlmConfig::default();
        config.allowed_models = vec!["b".to_string(), "z".to_string()];
        assert_eq!(scheduler.allowed_models(&config).await, vec!["b".to_string()]);

        // Empty allow-list admits everything the server reports.
        config.allowed_models.clear();
        assert_eq!(scheduler.allowed_models(&config).await.len(), 3);
    }

    #[tokio::test]
    async fn test_allowed_models_falls_back_when_listing_fails() {
        let (_dir, store) = store_with_post();
        let client = Arc::new(MockClient {
            models: Vec::new(),
            list_fails: true,
            response: MockResponse::Empty,
            generate_calls: AtomicUsize::new(0),
        });
        let scheduler = CommentScheduler::new(store, client);

        let mut config = LlmConfig::default();
        config.allowed_models = vec!["a".to_string()];
        assert_eq!(scheduler.allowed_models(&config).await, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_pick_random_model_none_available() {
        let (_dir, store) = store_with_post();
        let client = MockClient::with_text(&[], "ok");
        let scheduler = CommentScheduler::new(store, client);

        let err = scheduler.pick_random_model().await.unwrap_err();
        assert!(matches!(err, MarginaliaError::NoAllowedModels));
    }

    #[tokio::test]
    async fn test_disabled_loop_never_generates() {
        let (_dir, store) = store_with_post();
        let mut config = store.load_llm_config().unwrap();
        config.auto_enabled = false;
        config.allowed_models = vec!["m".to_string()];
        store.save_llm_config(&config).unwrap();

        let client = MockClient::with_text(&["m"], "ok");
        let scheduler = CommentScheduler::new(store, client.clone());

        let handle = scheduler.start().unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(client.calls(), 0);
        scheduler.stop();
        handle.abort();
    }

    #[tokio::test]
    async fn test_loop_generates_once_then_waits_out_the_interval() {
        let (_dir, store) = store_with_post();
        let client = MockClient::with_text(&["m"], "ok");
        let scheduler =
            CommentScheduler::with_timing(store.clone(), client.clone(), fast_timing());

        let handle = scheduler.start().unwrap();
        wait_for_calls(&client, 1).await;

        // min_interval still holds the 60s floor, so no second attempt
        // lands inside this window.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(client.calls(), 1);
        assert_eq!(store.load_comments().unwrap().len(), 1);

        scheduler.stop();
        handle.abort();
    }

    #[tokio::test]
    async fn test_start_is_single_instance() {
        let (_dir, store) = store_with_post();
        let client = MockClient::with_text(&["m"], "ok");
        let scheduler = CommentScheduler::new(store, client);

        let handle = scheduler.start().unwrap();
        assert!(scheduler.is_running());
        assert!(scheduler.start().is_none());

        scheduler.stop();
        handle.abort();
    }
}
