//! The chat agent behind Pengate.
//!
//! A request flows through three pieces:
//!
//! 1. **Prompt**: [`build_system_prompt`] concatenates the core text, the
//!    mode's fragment block and the caller's canvas context
//! 2. **Gate**: [`plan_step`] decides, before every step, which tools the
//!    model may call, holding `batch_design` back until the prerequisite
//!    lookups appear in the history
//! 3. **Session**: [`ChatSession`] runs the steps and streams
//!    [`AgentStreamEvent`]s until the model stops, calls are handed to the
//!    client, or the step bound is hit

pub mod gate;
pub mod history;
pub mod mode;
pub mod prompt;
pub mod session;
pub mod stream_event;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use gate::{Prerequisite, StepPlan, plan_step};
pub use history::{RecordedCall, RecordedResult, StepHistory, StepRecord};
pub use mode::AgentMode;
pub use prompt::build_system_prompt;
pub use session::ChatSession;
pub use stream_event::{AgentStreamEvent, FinishReason};
