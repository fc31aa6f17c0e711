//! Domain types: identifiers, jobs, snapshots, publish payloads.

pub mod card;
pub mod ids;
pub mod job;
pub mod snapshot;

pub use card::{CardKind, OrderCard};
pub use ids::{ChannelId, GroupId, JobId, MessageId, RoleId, UserId};
pub use job::{JobPatch, TrackingJob};
pub use snapshot::{ScrapeSnapshot, MAX_CART_ITEMS};
