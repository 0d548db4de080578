pub mod documents;
pub mod init;
pub mod queue;
pub mod snapshots;

pub use documents::{documents, DocumentsCommand};
pub use init::{init, InitArgs};
pub use queue::{queue, QueueCommand};
pub use snapshots::{snapshots, SnapshotsCommand};

use chrono::{DateTime, Utc};

/// "3m ago", "2h ago", "5d ago"
pub(crate) fn format_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(at);
    if age.num_seconds() < 60 {
        "just now".to_string()
    } else if age.num_minutes() < 60 {
        format!("{}m ago", age.num_minutes())
    } else if age.num_hours() < 24 {
        format!("{}h ago", age.num_hours())
    } else {
        format!("{}d ago", age.num_days())
    }
}
