pub mod activity;
pub mod approval;
pub mod post;
pub mod service;
pub mod store;

pub use activity::{Action, AuditEntry};
pub use approval::ApprovalRequest;
pub use post::{Importance, NewPost, PostStatus, PublishRecord};
pub use service::{RecordPolicy, RecordService, SweepReport};
pub use store::{JsonStore, MemoryStore, PostStore};
