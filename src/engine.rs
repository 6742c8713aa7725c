//! # Declutter engine
//! Maps an incoming chat message to an allow/suppress/annotate decision.
//! Pure policy over the repetition cache; no I/O, no timers.
//!
//! Ownership: the engine owns the cache and its configuration. The host
//! owns the engine and the eviction task (see `scheduler`); on teardown it
//! calls `clear` before aborting the task.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::debug;

use crate::cache::RepetitionCache;
use crate::config::{DeclutterConfig, KeyingMode};

/// Sentinel partition key shared by all messages in global keying mode, and
/// the fallback for authorless messages in per-author mode.
const GLOBAL_KEY: &str = "*";

/// Identity and badges of a message's author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: String,
    pub moderator: bool,
    pub broadcaster: bool,
}

impl Author {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            moderator: false,
            broadcaster: false,
        }
    }

    pub fn moderator(mut self) -> Self {
        self.moderator = true;
        self
    }

    pub fn broadcaster(mut self) -> Self {
        self.broadcaster = true;
        self
    }

    fn privileged(&self) -> bool {
        self.moderator || self.broadcaster
    }
}

/// One candidate message from the stream.
///
/// `repetition_count` is the memoization slot: the engine scores a message
/// at most once, so re-running the decision (the host pipeline may invoke
/// it several times per message) never double-inserts into the cache.
/// `None` means "not scored yet" — a scored count of 0 is remembered too.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub text: String,
    pub author: Option<Author>,
    pub deleted: bool,
    pub repetition_count: Option<u32>,
}

impl ChatMessage {
    pub fn new(text: impl Into<String>, author: Option<Author>) -> Self {
        Self {
            text: text.into(),
            author,
            deleted: false,
            repetition_count: None,
        }
    }
}

/// The local viewer running the filter, as opposed to message authors.
#[derive(Debug, Clone, Default)]
pub struct ViewerContext {
    pub viewer_id: Option<String>,
    /// Whether the viewer moderates the channel they are watching.
    pub viewer_is_moderator: bool,
}

/// Engine verdict for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Pass through unmodified.
    Allow,
    /// Hide the message.
    Suppress,
    /// Keep the message but badge it with its repetition count.
    Annotate(u32),
}

pub struct DeclutterEngine {
    cache: Arc<Mutex<RepetitionCache>>,
    config: Mutex<DeclutterConfig>,
}

impl DeclutterEngine {
    pub fn new(config: DeclutterConfig) -> Self {
        let config = config.normalized();
        Self {
            cache: Arc::new(Mutex::new(RepetitionCache::new(config.cache_ttl()))),
            config: Mutex::new(config),
        }
    }

    /// Decide what to do with `msg`, scoring it against recent history.
    ///
    /// Pre-filters short-circuit to `Allow` without touching the cache, in
    /// order: deleted or contentless messages; the privileged bypasses
    /// (viewer moderates the channel and the force-enable override is off,
    /// or the author carries a mod/broadcaster badge under
    /// `ignore_moderators`); the viewer's own messages.
    pub fn evaluate(
        &self,
        msg: &mut ChatMessage,
        viewer: &ViewerContext,
        now: DateTime<Utc>,
    ) -> Decision {
        let cfg = self
            .config
            .lock()
            .expect("declutter config mutex poisoned")
            .clone();

        if msg.deleted || msg.text.trim().is_empty() {
            return Decision::Allow;
        }
        if viewer.viewer_is_moderator && !cfg.force_enabled_for_moderators {
            return Decision::Allow;
        }
        if cfg.ignore_moderators && msg.author.as_ref().is_some_and(Author::privileged) {
            return Decision::Allow;
        }
        if let (Some(author), Some(viewer_id)) = (&msg.author, &viewer.viewer_id) {
            // Never self-censor.
            if author.id == *viewer_id {
                return Decision::Allow;
            }
        }

        let count = match msg.repetition_count {
            Some(n) => n,
            None => {
                let key = partition_key(&cfg, msg);
                let n = self
                    .cache
                    .lock()
                    .expect("repetition cache mutex poisoned")
                    .record_and_score(key, &msg.text, cfg.similarity_fraction(), now);
                msg.repetition_count = Some(n);
                n
            }
        };

        if count >= cfg.repetition_threshold {
            if cfg.annotate_instead_of_hide {
                counter!("declutter_annotated_total").increment(1);
                Decision::Annotate(count)
            } else {
                counter!("declutter_suppressed_total").increment(1);
                debug!(
                    target: "declutter",
                    count,
                    text_len = msg.text.len(),
                    "suppressing repeated message"
                );
                Decision::Suppress
            }
        } else {
            Decision::Allow
        }
    }

    /// Swap in a new configuration. Returns `true` when the eviction
    /// interval changed, so the host restarts its eviction task with
    /// `config().eviction_interval()`.
    pub fn update_config(&self, new: DeclutterConfig) -> bool {
        let new = new.normalized();
        let mut cfg = self.config.lock().expect("declutter config mutex poisoned");
        let interval_changed = new.eviction_interval() != cfg.eviction_interval();
        if new.cache_ttl_secs != cfg.cache_ttl_secs {
            self.cache
                .lock()
                .expect("repetition cache mutex poisoned")
                .set_ttl(new.cache_ttl());
        }
        *cfg = new;
        interval_changed
    }

    /// Snapshot of the current configuration (annotation color passthrough
    /// for renderers, eviction interval for the host's timer).
    pub fn config(&self) -> DeclutterConfig {
        self.config
            .lock()
            .expect("declutter config mutex poisoned")
            .clone()
    }

    /// Shared handle to the cache, for the eviction scheduler.
    pub fn cache(&self) -> Arc<Mutex<RepetitionCache>> {
        Arc::clone(&self.cache)
    }

    /// Drop all cached history. Teardown runs this before cancelling the
    /// eviction task.
    pub fn clear(&self) {
        self.cache
            .lock()
            .expect("repetition cache mutex poisoned")
            .clear();
    }
}

fn partition_key<'a>(cfg: &DeclutterConfig, msg: &'a ChatMessage) -> &'a str {
    match cfg.keying {
        KeyingMode::Global => GLOBAL_KEY,
        KeyingMode::PerAuthor => msg
            .author
            .as_ref()
            .map(|a| a.id.as_str())
            .unwrap_or(GLOBAL_KEY),
    }
}
