//! Live Delivery-Order Tracker
//!
//! A library for tracking a delivery order's public status page and
//! mirroring it into a chat channel until the order arrives.
//!
//! # Design Philosophy
//!
//! **"The store is the truth, the page is a lens"**
//!
//! - Extraction is total: malformed markup yields absent fields, never errors
//! - Jobs are durable: a crash loses timers and pages, never jobs
//! - Publishing is idempotent: identical payloads are never re-sent
//! - Collaborators sit behind traits so everything is testable offline
//!
//! # Usage
//!
//! ```rust,ignore
//! use ordertrack::{MemoryJobStore, Tracker, TrackerConfig};
//! use ordertrack::session::{SessionConfig, SessionPool};
//! use ordertrack::testing::MockChat;
//! use ordertrack::types::{ChannelId, GroupId, RoleId};
//!
//! let config = TrackerConfig::new("Order Tracker", RoleId::new("role-1"));
//! let pool = SessionPool::new(SessionConfig::default());
//! let tracker = Tracker::new(MemoryJobStore::new(), MockChat::new(), pool, config);
//!
//! // Pick up jobs left over from the previous run, then start a new one
//! tracker.resume().await?;
//! tracker
//!     .start(url, GroupId::new("g1"), ChannelId::new("c1"), None)
//!     .await?;
//! ```
//!
//! # Modules
//!
//! - [`extract`] - Markup-to-snapshot extraction engine
//! - [`phase`] - Delivery-phase classifier
//! - [`session`] - Shared headless-browser session pool
//! - [`store`] - Job store implementations (memory, SQLite)
//! - [`scheduler`] - Per-job lifecycle and polling
//! - [`traits`] - Collaborator boundaries (chat, store, session)
//! - [`testing`] - Mock implementations for testing

pub mod command;
pub mod config;
pub mod error;
pub mod extract;
pub mod health;
pub mod phase;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{ChatError, Result, SessionError, StoreError, TrackError};
pub use extract::extract;
pub use phase::{classify, Phase};
pub use scheduler::{Tracker, TrackerConfig};
pub use traits::{ChatClient, JobStore, OrderPage, PagePool};
pub use types::{
    CardKind, ChannelId, GroupId, JobId, JobPatch, MessageId, OrderCard, RoleId, ScrapeSnapshot,
    TrackingJob, UserId,
};

// Re-export stores
pub use store::{MemoryJobStore, SqliteJobStore};

// Re-export the command-surface validator
pub use command::validate_order_url;

// Re-export session pool
pub use session::{SessionConfig, SessionPool};

// Re-export testing utilities
pub use testing::{MockChat, MockOrderPage, MockPagePool};
