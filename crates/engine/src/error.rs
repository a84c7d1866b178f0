// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error type.

use gyre_core::task::TransitionError;
use gyre_core::TaskId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
    #[error("unknown task definition: {0}")]
    UnknownTask(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("illegal verbosity level: {0:?}")]
    IllegalVerbosity(String),
    #[error("runtime overlay error: {0}")]
    Overlay(String),
    #[error("reload failed: {0}")]
    Reload(String),
    #[error("point error: {0}")]
    Point(#[from] gyre_core::PointError),
}
