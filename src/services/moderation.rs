// Moderation Policy - who may soft-delete comments
// Injected into the comment service so the rule is configuration, not a literal

use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::AppResult;
use crate::infrastructure::viewer::ViewerContext;

/// Moderator used when none is configured.
pub const DEFAULT_MODERATOR_EMAIL: &str = "moderator@hw3.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationDecision {
    Allow,
    Deny,
}

#[async_trait]
pub trait ModerationPolicy: Send + Sync {
    async fn evaluate(&self, viewer: &ViewerContext) -> AppResult<ModerationDecision>;

    /// Rule name for logs
    fn name(&self) -> &str;
}

/// Allows exactly the viewers whose verified email is in the configured set.
/// Matching is exact and case-sensitive; anonymous viewers are always denied.
#[derive(Debug, Clone)]
pub struct ModeratorEmailPolicy {
    moderators: HashSet<String>,
}

impl ModeratorEmailPolicy {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            moderators: emails.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_moderator(&self, email: &str) -> bool {
        self.moderators.contains(email)
    }
}

impl Default for ModeratorEmailPolicy {
    fn default() -> Self {
        Self::new([DEFAULT_MODERATOR_EMAIL])
    }
}

#[async_trait]
impl ModerationPolicy for ModeratorEmailPolicy {
    async fn evaluate(&self, viewer: &ViewerContext) -> AppResult<ModerationDecision> {
        match viewer.email() {
            Some(email) if self.is_moderator(email) => Ok(ModerationDecision::Allow),
            _ => Ok(ModerationDecision::Deny),
        }
    }

    fn name(&self) -> &str {
        "moderator_email"
    }
}
