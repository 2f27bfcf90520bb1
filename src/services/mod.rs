pub mod avatar;
pub mod classifier;
pub mod cleanup;
pub mod fanout;
pub mod generator;
pub mod metrics;
pub mod monitor;
pub mod retry;
pub mod scheduler;
pub mod weather;
pub mod workflow;
