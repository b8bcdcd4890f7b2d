#![allow(dead_code)]

pub use jobwait_test_utils::builders;
pub use jobwait_test_utils::clock::ManualClock;
pub use jobwait_test_utils::fake_scheduler::{listing, FakeScheduler};
pub use jobwait_test_utils::{init_tracing, with_timeout};
