//! Dependency-aware agent orchestration.

pub mod rate_limit;
pub mod retry;
pub mod scheduler;

pub use rate_limit::RateLimiter;
pub use retry::RetryPolicy;
pub use scheduler::{ExecutionStrategy, Scheduler, SchedulerConfig};
