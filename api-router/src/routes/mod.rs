pub mod chat;
pub mod liveness;
pub mod projects;
pub mod readiness;
pub mod upload;
