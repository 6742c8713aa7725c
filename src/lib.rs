// src/lib.rs
// Public library surface for the host chat pipeline (and integration tests).

//! Repetition detection for live chat streams.
//!
//! A host pipeline feeds every candidate message into
//! [`DeclutterEngine::evaluate`], which scores it against recently seen
//! history (Dice bigram similarity over a TTL-evicting, per-key cache) and
//! returns an allow/suppress/annotate [`Decision`]. A periodic eviction
//! task keeps memory bounded when traffic stops; the host owns its
//! lifecycle via [`spawn_eviction_scheduler`].

pub mod cache;
pub mod config;
pub mod engine;
pub mod scheduler;
pub mod similarity;

// ---- Re-exports for stable public API ----
pub use crate::cache::RepetitionCache;
pub use crate::config::{DeclutterConfig, KeyingMode};
pub use crate::engine::{Author, ChatMessage, Decision, DeclutterEngine, ViewerContext};
pub use crate::scheduler::spawn_eviction_scheduler;
pub use crate::similarity::similarity;
