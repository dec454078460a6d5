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

//! # Onion Timer
//!
//! A self-owned interval timer. Once started, a dedicated worker thread waits
//! for the configured period, invokes a user-supplied handler, and either stops
//! (one-shot) or re-arms on a fixed cadence, skipping missed ticks instead
//! of queuing them.

#![warn(missing_docs)]

pub mod callback;
pub mod config;
pub mod error;
pub mod timer;

pub use callback::{SharedHandler, TimeoutHandler};
pub use config::TimerConfig;
pub use error::{TimerError, TimerResult};
pub use timer::IntervalTimer;
