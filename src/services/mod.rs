pub mod compression;
pub mod progress;
pub mod reconciler;
pub mod scheduler;

pub use compression::{compress_sync_details, decompress_sync_details};
pub use progress::{ProgressOutcome, ProgressPersister};
pub use reconciler::{ReconcileOutcome, Reconciler, ReconcilerSettings};
pub use scheduler::{ReconcileScheduler, SweepReport};
