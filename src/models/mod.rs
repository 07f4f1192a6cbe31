// Comment domain types

pub mod comment;

pub use comment::{
    Comment, CommentId, CommentState, ModerationOutcome, NewComment, PostCommentRequest,
    ANONYMOUS_AUTHOR, SOFT_DELETED_STATUS,
};
