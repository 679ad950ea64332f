pub mod pool;

pub use pool::{BufferPool, BufferRelease, PoolMetricsSnapshot};
