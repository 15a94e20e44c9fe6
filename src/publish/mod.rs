pub mod coordinator;
pub mod models;

pub use coordinator::PublishCoordinator;
pub use models::{CreatePostRequest, CreatePostResponse, Post, PostMeta};
