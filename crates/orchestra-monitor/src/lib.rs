/*
[INPUT]:  Public API exports for orchestra-monitor crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod config;
pub mod dispatcher;
pub mod reconciler;
pub mod render;
pub mod session;
pub mod snapshot;
pub mod store;

// Re-export main types for convenience
pub use config::MonitorConfig;
pub use dispatcher::{ActionDispatcher, Notice};
pub use reconciler::{TaskCollection, merge};
pub use session::{ConnectionState, MonitorSession, ReconnectPolicy, SessionSettings, SnapshotState};
pub use snapshot::SnapshotLoader;
pub use store::{TaskStore, TaskView};
