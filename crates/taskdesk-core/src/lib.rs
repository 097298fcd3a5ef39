pub mod attachment;
pub mod auth;
pub mod envelope;
pub mod task;
pub mod user;
pub mod validation;

pub use auth::{Caller, TokenResponse};
pub use envelope::Envelope;
pub use task::{Task, TaskStatus, TaskView};
pub use user::User;
pub use validation::ValidationErrors;
