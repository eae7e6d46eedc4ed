mod retry;
mod updater;

pub use retry::RetryPolicy;
pub use updater::{OptimisticUpdater, UpdateReport};
