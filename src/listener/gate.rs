//! Listener gate for asynchronous bodies.
//!
//! Wraps a body so that every poll, including the first one, first asks the
//! owner whether it is still running. A stopped owner turns the next resume
//! into `TaskError::ListenerStopped` and the body is dropped unpolled.
//! Work that never suspends runs to completion regardless.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::listener::ListenerRef;
use crate::error::TaskError;

pub(crate) struct Gate<F> {
    owner: ListenerRef,
    inner: Pin<Box<F>>,
}

impl<F> Gate<F> {
    pub(crate) fn new(owner: ListenerRef, inner: F) -> Self {
        Self {
            owner,
            inner: Box::pin(inner),
        }
    }
}

impl<T, F> Future for Gate<F>
where
    F: Future<Output = Result<T, TaskError>>,
{
    type Output = Result<T, TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if !self.owner.running() {
            return Poll::Ready(Err(TaskError::ListenerStopped {
                listener: self.owner.name().to_string(),
            }));
        }
        self.inner.as_mut().poll(cx)
    }
}
