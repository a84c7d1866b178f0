// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gyre-engine: the scheduling engine.
//!
//! All state mutation happens on one engine loop. Producers (runner
//! invocations, xtrigger calls, event handlers, the command listener) feed
//! a single [`EngineMsg`] queue; the [`Runtime`] folds each message into
//! the task pool and returns [`gyre_core::Effect`]s for the [`Executor`],
//! which runs the side effects off-loop and feeds results back into the
//! same queue.

mod broadcast;
mod error;
mod executor;
mod handlers;
mod jobs;
mod msg;
mod pool;
mod router;
mod runtime;
mod scheduler;
mod xtrigger;

pub use broadcast::{deep_merge, BroadcastStore};
pub use error::RuntimeError;
pub use executor::Executor;
pub use jobs::{JobManager, PollPhase};
pub use msg::{EngineMsg, OperatorCommand, StopMode};
pub use pool::TaskPool;
pub use runtime::{Runtime, RuntimeConfig, StepOutcome, VERBOSITY_LEVELS};
pub use scheduler::Scheduler;
pub use xtrigger::{WallClock, WorkflowState, XRandom, XtriggerCall, XtriggerEngine};
