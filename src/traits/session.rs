//! Browser-session boundary.
//!
//! The scheduler owns one page per job through these traits; the
//! chromiumoxide-backed [`crate::session::SessionPool`] is the real
//! implementation, [`crate::testing::MockPagePool`] the test one.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::SessionResult;
use crate::types::ScrapeSnapshot;

/// One isolated page, exclusively owned by a single job.
#[async_trait]
pub trait OrderPage: Send + Sync {
    /// Navigate (only if not already at `url`), wait for the client app
    /// to settle, and extract a snapshot from the rendered markup.
    ///
    /// Landing on an authentication domain yields a snapshot with only
    /// `login_required` set. Transient render faults are retried once
    /// internally before being propagated.
    async fn fetch_snapshot(&self, url: &str) -> SessionResult<ScrapeSnapshot>;

    /// Release the page. Best-effort; never blocks forever.
    async fn close(&self);
}

/// Shared browser process handing out per-job pages.
#[async_trait]
pub trait PagePool: Send + Sync {
    /// Open a fresh isolated page. The first call launches the shared
    /// browser; later calls reuse it.
    async fn open_page(&self) -> SessionResult<Arc<dyn OrderPage>>;

    /// Close the shared browser. Outstanding pages become dead.
    async fn shutdown(&self);
}
