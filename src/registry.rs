use async_trait::async_trait;

use crate::db::Database;
use crate::error::Result;

/// Answers whether a voter identity was issued for a poll. Identities come
/// from an external service; this crate only checks them.
#[async_trait]
pub trait VoterRegistry: Send + Sync {
    async fn is_registered(&self, poll_id: &str, voter_id: &str) -> Result<bool>;
}

#[async_trait]
impl VoterRegistry for Database {
    async fn is_registered(&self, poll_id: &str, voter_id: &str) -> Result<bool> {
        self.is_voter_registered(poll_id, voter_id).await
    }
}
