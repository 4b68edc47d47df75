// Client-side synchronization: the durable offline action queue and the
// optimistic chat reconciler.

pub mod queue;
pub mod reconciler;

pub use queue::{spawn_reconnect_flush, FlushReport, OfflineQueue};
pub use reconciler::{ChatReconciler, ThreadState};
