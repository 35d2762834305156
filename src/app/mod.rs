pub mod auth;
pub mod comments;
pub mod follows;
pub mod groups;
pub mod media;
pub mod policy;
pub mod posts;
pub mod users;
