mod accounts;
mod http;
mod password;
mod tasks;
mod traits;

pub use accounts::AccountService;
pub use http::HttpService;
pub use tasks::TaskManager;
pub use traits::{ServiceError, TaskService};

/// Message for a task id that does not exist.
pub const TASK_NOT_FOUND: &str = "Task not found";
/// Message for a task owned by someone else, and for failed logins.
pub const UNAUTHORIZED: &str = "Unauthorized";
pub const ATTACHMENT_NOT_FOUND: &str = "Attachment not found";
pub const FILE_NOT_FOUND: &str = "File not found";
