use async_trait::async_trait;
use thiserror::Error;

use brewbot_core::domain::participant::Member;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("member fetch for guild `{guild_id}` timed out after {timeout_ms} ms")]
    MembershipTimeout { guild_id: String, timeout_ms: u64 },
    #[error("member fetch failed: {0}")]
    MembershipFailed(String),
    #[error("could not deliver direct message to `{user_id}`: {reason}")]
    DeliveryFailed { user_id: String, reason: String },
}

/// Guild membership lookups. `role` may be a role name or a role id.
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    /// Refreshes membership from the platform; may be slow or time out.
    async fn fetch_members_with_role(
        &self,
        guild_id: &str,
        role: &str,
    ) -> Result<Vec<Member>, ChatError>;

    /// Whatever the client already has cached. Possibly stale, never fails.
    async fn cached_members_with_role(&self, guild_id: &str, role: &str) -> Vec<Member>;
}

#[async_trait]
pub trait DirectMessenger: Send + Sync {
    async fn send_direct_message(&self, user_id: &str, content: &str) -> Result<(), ChatError>;
}

#[derive(Default)]
pub struct NoopMembershipDirectory;

#[async_trait]
impl MembershipDirectory for NoopMembershipDirectory {
    async fn fetch_members_with_role(
        &self,
        _guild_id: &str,
        _role: &str,
    ) -> Result<Vec<Member>, ChatError> {
        Ok(Vec::new())
    }

    async fn cached_members_with_role(&self, _guild_id: &str, _role: &str) -> Vec<Member> {
        Vec::new()
    }
}

/// Refuses every message. Used when no chat client is wired up, so callers
/// see a delivery failure instead of a silent drop.
#[derive(Default)]
pub struct NoopDirectMessenger;

#[async_trait]
impl DirectMessenger for NoopDirectMessenger {
    async fn send_direct_message(&self, user_id: &str, content: &str) -> Result<(), ChatError> {
        tracing::debug!(
            event_name = "egress.chat.dm_dropped",
            user_id,
            content_len = content.len(),
            "no chat client configured; direct message dropped"
        );
        Err(ChatError::DeliveryFailed {
            user_id: user_id.to_owned(),
            reason: "no chat client configured".to_owned(),
        })
    }
}
