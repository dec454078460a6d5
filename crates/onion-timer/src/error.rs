// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types for the timer.

use thiserror::Error;

/// Errors reported by the checked timer operations.
#[derive(Debug, Error)]
pub enum TimerError {
    /// The timer was asked to start with a zero period.
    #[error("timer period must be greater than zero")]
    ZeroPeriod,
    /// The operating system refused to create the worker thread.
    #[error("failed to spawn timer worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// A specialized `Result` type for timer operations.
pub type TimerResult<T> = Result<T, TimerError>;
