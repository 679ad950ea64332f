pub mod worker_pool;

pub use worker_pool::{PoolRuntimeSnapshot, Task, WorkerPool, WorkerRuntimeSnapshot};
