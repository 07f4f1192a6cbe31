// Core infrastructure modules
pub mod articles;          // Upstream article search pass-through
pub mod database;          // Comment store interface
pub mod id_generator;      // Comment id generation
pub mod middleware;        // Viewer context middleware and extractor
pub mod oidc;              // OpenID-Connect login flow
pub mod session;           // Server-side browser sessions
pub mod sqlite_database;   // SQLite comment store
pub mod viewer;            // Viewer context

pub use articles::ArticleSearchClient;
pub use database::CommentStore;
pub use id_generator::CommentIdGenerator;
pub use oidc::OidcClient;
pub use session::{SessionId, SessionStore};
pub use sqlite_database::SqliteCommentStore;
pub use viewer::{Identity, ViewerContext};
