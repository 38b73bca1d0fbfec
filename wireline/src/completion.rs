//! Resettable single-slot completion.
//!
//! A [`Completion`] is set exactly once per cycle with either a result or
//! an exception and then [`reset`] for the next cycle. Awaiting an
//! already-set completion resolves on first poll, and every await in a cycle
//! observes the same outcome. Only the most recent waiter is woken, so a
//! cycle should have a single waiter at a time.
//!
//! [`reset`]: Completion::reset

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll, Waker};

use crate::error::Error;

enum State<T, E> {
    Pending(Option<Waker>),
    Ready(Result<T, E>),
}

pub struct Completion<T, E> {
    state: Mutex<State<T, E>>,
}

impl<T, E> Default for Completion<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Completion<T, E> {
    pub fn new() -> Self {
        Completion {
            state: Mutex::new(State::Pending(None)),
        }
    }

    /// Clear any result and registered waiter.
    pub fn reset(&self) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = State::Pending(None);
    }

    pub fn set_result(&self, value: T) -> Result<(), Error> {
        self.complete(Ok(value))
    }

    pub fn set_exception(&self, error: E) -> Result<(), Error> {
        self.complete(Err(error))
    }

    /// `true` once a result or exception has been set in this cycle.
    pub fn is_completed(&self) -> bool {
        !matches!(
            *self.state.lock().unwrap_or_else(|e| e.into_inner()),
            State::Pending(_)
        )
    }

    fn complete(&self, result: Result<T, E>) -> Result<(), Error> {
        let waker = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let State::Pending(waker) = &mut *state else {
                return Err(Error::AlreadyCompleted);
            };
            let waker = waker.take();
            *state = State::Ready(result);
            waker
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        Ok(())
    }

    /// Wait for the result of the current cycle.
    pub fn wait(&self) -> Wait<'_, T, E> {
        Wait { completion: self }
    }
}

/// Future returned by [`Completion::wait`].
pub struct Wait<'a, T, E> {
    completion: &'a Completion<T, E>,
}

impl<T: Clone, E: Clone> Future for Wait<'_, T, E> {
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self
            .completion
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        match &mut *state {
            State::Pending(waker) => {
                match waker {
                    Some(w) if w.will_wake(cx.waker()) => {}
                    _ => *waker = Some(cx.waker().clone()),
                }
                Poll::Pending
            }
            State::Ready(result) => Poll::Ready(result.clone()),
        }
    }
}
