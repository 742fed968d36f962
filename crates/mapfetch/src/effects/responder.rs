//! Delivery of the terminal result to the caller.

use tokio::sync::oneshot;

use crate::data::{ClassifiedOutcome, FailureKind, FetchResponse};

/// Receives the single terminal result of a request.
///
/// Both methods take `self` by value: once one has been called the
/// responder is gone. Calls happen on a worker thread of the fetcher.
pub trait Responder: Send + 'static {
    fn on_response(self: Box<Self>, response: FetchResponse);

    fn on_failure(self: Box<Self>, kind: FailureKind, message: String);
}

/// Hand `outcome` to `responder`.
pub fn deliver(responder: Box<dyn Responder>, outcome: ClassifiedOutcome) {
    match outcome {
        ClassifiedOutcome::Success(response) => responder.on_response(response),
        ClassifiedOutcome::Failure { kind, message } => responder.on_failure(kind, message),
    }
}

impl Responder for oneshot::Sender<ClassifiedOutcome> {
    fn on_response(self: Box<Self>, response: FetchResponse) {
        let _ = (*self).send(ClassifiedOutcome::Success(response));
    }

    fn on_failure(self: Box<Self>, kind: FailureKind, message: String) {
        let _ = (*self).send(ClassifiedOutcome::Failure { kind, message });
    }
}

/// Adapts a closure taking the whole outcome into a [`Responder`].
pub struct FnResponder<F>(F);

impl<F> FnResponder<F>
where
    F: FnOnce(ClassifiedOutcome) + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }

    pub fn boxed(f: F) -> Box<dyn Responder> {
        Box::new(Self(f))
    }
}

impl<F> Responder for FnResponder<F>
where
    F: FnOnce(ClassifiedOutcome) + Send + 'static,
{
    fn on_response(self: Box<Self>, response: FetchResponse) {
        (self.0)(ClassifiedOutcome::Success(response))
    }

    fn on_failure(self: Box<Self>, kind: FailureKind, message: String) {
        (self.0)(ClassifiedOutcome::Failure { kind, message })
    }
}
