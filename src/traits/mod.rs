//! Collaborator trait boundaries (chat platform, browser, storage).

pub mod chat;
pub mod session;
pub mod store;

pub use chat::ChatClient;
pub use session::{OrderPage, PagePool};
pub use store::JobStore;
