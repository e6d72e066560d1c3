//! Task scheduling
//!
//! A priority-ordered queue feeding a single consumer loop. The loop owns
//! idle behavior (self-generated background work after an idle timeout)
//! and periodic persistence of the queue and per-source contexts.

mod core;
mod queue;
mod selftask;

pub use core::{ExchangeRecord, SELF_SOURCE, Scheduler, SchedulerConfig, SourceContext, TaskHandler};
pub use queue::TaskQueue;
pub use selftask::{FALLBACK_SELF_TASK, LlmSelfTaskGenerator, SelfTaskGenerator};
