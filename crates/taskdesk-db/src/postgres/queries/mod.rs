pub mod revoked_tokens;
pub mod tasks;
pub mod users;
