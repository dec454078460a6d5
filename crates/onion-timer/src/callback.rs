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

//! The action invoked by an [`IntervalTimer`](crate::IntervalTimer) when it elapses.

use std::sync::Arc;

/// Something that can be invoked each time a timer elapses.
///
/// Implemented for every `Fn() + Send + Sync` closure, so most callers never
/// name this trait directly. Implement it by hand when the handler is a type
/// with its own state.
pub trait TimeoutHandler: Send + Sync {
    /// Called on the timer's worker thread, with no timer lock held.
    fn on_timeout(&self);
}

impl<F> TimeoutHandler for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn on_timeout(&self) {
        self()
    }
}

/// The stored form of a handler. Cloning it is how the worker takes its snapshot.
pub type SharedHandler = Arc<dyn TimeoutHandler>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize);

    impl TimeoutHandler for Counter {
        fn on_timeout(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn closure_is_a_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        let handler: SharedHandler = Arc::new(move || {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        handler.on_timeout();
        handler.clone().on_timeout();

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn stateful_type_is_a_handler() {
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let handler: SharedHandler = counter.clone();

        handler.on_timeout();

        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }
}
