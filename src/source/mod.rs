//! Remote sources: where remote messages come from.

pub mod spool;

use crate::error::Result;
use crate::model::remote::RemoteMessage;

pub use spool::SpoolSource;

/// Which items to list and how many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListQuery {
    /// Only items whose read flag is not set.
    pub unread_only: bool,
    /// Stop after this many items (applied after ordering and filtering).
    pub limit: Option<usize>,
}

/// A remote account.
///
/// Listing always returns items newest first.
pub trait RemoteSource {
    fn list_messages(&mut self, query: &ListQuery) -> Result<Vec<RemoteMessage>>;

    /// Set the read flag of `item` on the remote side.
    fn mark_read(&mut self, item: &RemoteMessage) -> Result<()>;
}
