#![allow(dead_code, unused_imports)]

pub use growdag_test_utils::builders::{WorkflowBuilder, fast_options, only_node};
pub use growdag_test_utils::fake_backend::{FakeBackend, Outcome, Script};
pub use growdag_test_utils::hooks::{ADD_WHEN_SUCCEEDED, add_when_succeeded, json_hooks};
pub use growdag_test_utils::{init_tracing, with_timeout};
