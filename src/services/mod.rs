// Services - business rules over the infrastructure layer

pub mod comment_service;
pub mod moderation;

pub use comment_service::CommentService;
pub use moderation::{ModerationDecision, ModerationPolicy, ModeratorEmailPolicy};
