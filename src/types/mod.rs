// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent ID confusion at compile time.

mod app_name;
mod id;
mod text_enum;

pub use app_name::{AppName, AppNameError};
pub use id::{AppId, HostId, Id, NodeId, ReleaseId, RolloutId, TaskId};
pub(crate) use text_enum::text_enum;
pub use text_enum::UnknownVariant;
