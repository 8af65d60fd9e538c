//! # Engram Core
//!
//! A neuroscience-inspired memory retrieval and dynamics engine for
//! conversational and research agents. Each memory is a short text entry
//! that decays, consolidates, and associates with other entries purely
//! through usage — no explicit entity tagging required.
//!
//! - **Dual-Strength Model**: Bjork & Bjork (1992) storage/retrieval strength,
//!   here `core_strength`/`working_strength`, each with its own decay rate and
//!   a one-way transfer from working into core on consolidation.
//! - **Activation-Ranked Recall**: candidates are scored on a weighted blend
//!   of lexical/semantic match, recency, frequency, importance, and current
//!   strength, in the spirit of ACT-R's activation equation.
//! - **Hebbian Association**: "neurons that fire together, wire together"
//!   (Collins & Loftus, 1975) — entries recalled together repeatedly grow a
//!   symmetric associative link, independent of any explicit graph.
//! - **Session Working Memory**: a bounded, time-decayed active set (Miller's
//!   Law capacity, Baddeley-style decay) that lets a conversation skip a full
//!   recall while it's still circling the same topic.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use engram_core::{AddOptions, Engine, EngineConfig, EntryType};
//!
//! # fn main() -> engram_core::Result<()> {
//! let engine = Engine::open_in_memory(EngineConfig::chatbot())?;
//!
//! let id = engine.add(
//!     "the user's name is Alice Zhang",
//!     EntryType::Relational,
//!     0.8,
//!     AddOptions::default(),
//! )?;
//!
//! let results = engine.recall("user name", 5, None, true)?;
//! assert_eq!(results[0].id, id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! - `bundled-sqlite` (default): compile SQLite from source via `rusqlite`'s
//!   `bundled` feature rather than linking the system library.
//! - `encryption`: use SQLCipher instead (mutually exclusive with `bundled-sqlite`).

#![warn(rustdoc::missing_crate_level_docs)]

pub mod activation;
pub mod clock;
pub mod config;
pub mod consolidation;
pub mod embedding;
pub mod engine;
pub mod entry;
pub mod error;
pub mod hebbian;
pub mod retrieval;
pub mod session;
pub mod store;

pub use activation::ConfidenceLabel;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use consolidation::ConsolidationReport;
pub use embedding::{EmbeddingProvider, NullEmbedder};
pub use engine::{AddOptions, Engine, EngineStats};
pub use entry::{Entry, EntryType, Layer};
pub use error::{EngineError, Result};
pub use retrieval::RecallResult;
pub use session::{SessionRegistry, SessionWorkingMemory};
pub use store::{AssocEdge, EntryPatch, GraphEdge, SqliteStore, Store};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::{
        AddOptions, Engine, EngineConfig, EngineError, EngineStats, Entry, EntryType, Layer,
        RecallResult, Result, Store,
    };
}
