//! Handler pipeline: chainable extraction and completion steps.
//!
//! A handler is assembled by composing step factories into a single [`Step`].
//! At request time the step is driven against an [`Exchange`] (the
//! request/response pair): each continuation step yields the next step, the
//! drive loop invokes it with the same exchange, and the chain collapses to a
//! terminal step that writes the response.
//!
//! ## Core types
//!
//! - [`Step`]: closed union of the three step kinds: terminal, synchronous
//!   continuation, asynchronous continuation.
//! - [`Exchange`]: the per-request pair every step receives; the response
//!   side is a write-once slot.
//! - [`handler`]: wraps a composed step into a plain async
//!   `Request -> Response` function for registration against a route.
//!
//! The step factories themselves ([`respond`], [`body`], [`body_raw`],
//! [`path_params`]) live in [`extract`].

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{trace, warn};

use crate::http::{Request, Response, StatusCode};

mod extract;

pub use extract::{body, body_raw, path_params, respond};

/// A boxed future, the return type of asynchronous step functions.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Terminal step function: writes the final response for the exchange.
pub type CompleteFn = Box<dyn Fn(Exchange) -> BoxFuture<()> + Send + Sync>;

/// Continuation step function: returns the next step synchronously.
pub type NestedFn = Box<dyn Fn(Exchange) -> Step + Send + Sync>;

/// Continuation step function: resolves to the next step asynchronously.
pub type AsyncNestedFn = Box<dyn Fn(Exchange) -> BoxFuture<Step> + Send + Sync>;

/// One step of a handler pipeline.
///
/// A composed pipeline is itself a `Step`; driving it runs each layer in the
/// exact composition order until a [`Step::Complete`] writes the response.
/// Step functions are `Fn`, so one composed pipeline can serve any number of
/// requests; every invocation gets its own [`Exchange`] and shares no state
/// with other invocations.
pub enum Step {
    /// Terminal step. Performs the response write; nothing runs after it.
    Complete(CompleteFn),
    /// Returns another step to drive with the same exchange.
    Nested(NestedFn),
    /// Resolves to another step to drive with the same exchange.
    AsyncNested(AsyncNestedFn),
}

impl Step {
    /// Wraps an async terminal function into a [`Step::Complete`].
    pub fn complete<F, Fut>(f: F) -> Self
    where
        F: Fn(Exchange) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Step::Complete(Box::new(move |exchange| Box::pin(f(exchange))))
    }

    /// Wraps a synchronous continuation function into a [`Step::Nested`].
    pub fn nested<F>(f: F) -> Self
    where
        F: Fn(Exchange) -> Step + Send + Sync + 'static,
    {
        Step::Nested(Box::new(f))
    }

    /// Wraps an async continuation function into a [`Step::AsyncNested`].
    pub fn async_nested<F, Fut>(f: F) -> Self
    where
        F: Fn(Exchange) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Step> + Send + 'static,
    {
        Step::AsyncNested(Box::new(move |exchange| Box::pin(f(exchange))))
    }

    /// A terminal step that writes nothing.
    ///
    /// Returned by continuation steps that have already completed the
    /// response themselves (e.g. the validating extractor's failure path).
    pub fn halt() -> Self {
        Step::complete(|_| async {})
    }

    /// Runs this step once, returning the next step for continuation
    /// variants and `None` once a terminal step has run.
    async fn advance(&self, exchange: &Exchange) -> Option<Step> {
        match self {
            Step::Complete(f) => {
                f(exchange.clone()).await;
                None
            }
            Step::Nested(f) => Some(f(exchange.clone())),
            Step::AsyncNested(f) => Some(f(exchange.clone()).await),
        }
    }

    /// Drives this step to completion against `exchange`.
    ///
    /// Runs the step; while it yields continuations, invokes each with the
    /// same exchange, in order, until a terminal step runs. Steps that suspend
    /// do so only at their own async boundaries; there is no reordering.
    ///
    /// Panics raised inside handler-author functions are not caught here; they
    /// propagate to whatever invoked the pipeline.
    pub async fn drive(&self, exchange: &Exchange) {
        let mut depth = 0usize;
        let mut current = self.advance(exchange).await;
        while let Some(step) = current {
            depth += 1;
            trace!(depth, "pipeline step yielded a continuation");
            current = step.advance(exchange).await;
        }
        trace!(depth, written = exchange.is_written(), "pipeline complete");
    }
}

/// The request/response pair threaded through every step of a pipeline.
///
/// Cloning an `Exchange` is cheap and yields a handle to the *same* pair, so
/// each step observes the request and response slot of the invocation it
/// belongs to. The response side is write-once: the first
/// [`send_json`](Self::send_json) or [`send_status`](Self::send_status) wins
/// and later writes are ignored.
#[derive(Clone)]
pub struct Exchange {
    request: Arc<Request>,
    response: Arc<Mutex<Option<Response>>>,
}

impl Exchange {
    /// Creates a fresh exchange for one request. The response slot starts empty.
    pub fn new(request: Request) -> Self {
        Self {
            request: Arc::new(request),
            response: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the request being handled.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Writes a bare status response, with no body.
    pub fn send_status(&self, status: StatusCode) {
        self.write(Response::new(status));
    }

    /// Writes a response with the given status and `value` serialized as the
    /// JSON body.
    ///
    /// A value that fails to serialize degrades to a bare 500; no error
    /// escapes the pipeline.
    pub fn send_json<T: Serialize + ?Sized>(&self, status: StatusCode, value: &T) {
        match Response::json(status, value) {
            Ok(response) => self.write(response),
            Err(e) => {
                warn!(error = %e, "response body failed to serialize, sending bare 500");
                self.write(Response::new(StatusCode::InternalServerError));
            }
        }
    }

    /// Returns `true` once a terminal write has happened.
    pub fn is_written(&self) -> bool {
        self.slot().is_some()
    }

    /// Removes and returns the written response, leaving the slot empty.
    ///
    /// `None` when no step wrote a response.
    pub fn take_response(&self) -> Option<Response> {
        self.slot().take()
    }

    fn write(&self, response: Response) {
        let mut slot = self.slot();
        if slot.is_some() {
            warn!("response already written, ignoring second write");
            return;
        }
        *slot = Some(response);
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Response>> {
        self.response.lock().expect("response slot poisoned")
    }
}

/// Wraps a composed pipeline into a registrable handler function.
///
/// The returned closure can be handed to any server that accepts an async
/// `Request -> Response` function for exactly one route/method. Each call
/// builds a fresh [`Exchange`], drives the pipeline, and extracts the written
/// response. A pipeline that finishes without writing anything yields a bare
/// `500 Internal Server Error` fallback.
///
/// # Examples
///
/// ```
/// use trellis::http::{Method, Request, StatusCode};
/// use trellis::pipeline::{Step, handler};
///
/// let pipeline = Step::complete(|exchange| async move {
///     exchange.send_status(StatusCode::NoContent);
/// });
/// let handle = handler(pipeline);
/// // hand `handle` to the server owning the route
/// # let _ = handle(Request::builder(Method::Get, "/").build());
/// ```
pub fn handler(step: Step) -> impl Fn(Request) -> BoxFuture<Response> + Send + Sync + 'static {
    let step = Arc::new(step);
    move |request| {
        let step = Arc::clone(&step);
        Box::pin(async move {
            let exchange = Exchange::new(request);
            step.drive(&exchange).await;
            exchange.take_response().unwrap_or_else(|| {
                warn!("pipeline finished without writing a response, sending 500");
                Response::new(StatusCode::InternalServerError)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request() -> Request {
        Request::builder(Method::Get, "/").build()
    }

    #[tokio::test]
    async fn complete_step_writes_response() {
        let step = Step::complete(|exchange: Exchange| async move {
            exchange.send_status(StatusCode::NoContent);
        });
        let exchange = Exchange::new(request());
        step.drive(&exchange).await;
        assert_eq!(
            exchange.take_response().unwrap().status(),
            StatusCode::NoContent
        );
    }

    #[tokio::test]
    async fn nested_steps_collapse_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let (a, b) = (Arc::clone(&order), Arc::clone(&order));

        let step = Step::nested(move |_| {
            a.lock().unwrap().push("outer");
            let b = Arc::clone(&b);
            Step::async_nested(move |_| {
                let b = Arc::clone(&b);
                async move {
                    b.lock().unwrap().push("middle");
                    Step::complete(|exchange: Exchange| async move {
                        exchange.send_status(StatusCode::Ok);
                    })
                }
            })
        });

        let exchange = Exchange::new(request());
        step.drive(&exchange).await;

        assert_eq!(*order.lock().unwrap(), vec!["outer", "middle"]);
        assert_eq!(exchange.take_response().unwrap().status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn halt_writes_nothing() {
        let exchange = Exchange::new(request());
        Step::halt().drive(&exchange).await;
        assert!(!exchange.is_written());
        assert!(exchange.take_response().is_none());
    }

    #[tokio::test]
    async fn first_write_wins() {
        let exchange = Exchange::new(request());
        exchange.send_status(StatusCode::Ok);
        exchange.send_json(StatusCode::InternalServerError, &json!({ "late": true }));
        let response = exchange.take_response().unwrap();
        assert_eq!(response.status(), StatusCode::Ok);
        assert!(response.body().is_empty());
    }

    #[tokio::test]
    async fn pipeline_is_reusable_and_isolated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let step = Step::nested(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Step::complete(|exchange: Exchange| async move {
                exchange.send_json(StatusCode::Ok, &json!({ "n": 1 }));
            })
        });

        let first = Exchange::new(request());
        let second = Exchange::new(request());
        step.drive(&first).await;
        step.drive(&second).await;

        let a = first.take_response().unwrap();
        let b = second.take_response().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(a.status(), b.status());
        assert_eq!(a.body(), b.body());
    }

    #[tokio::test]
    async fn handler_returns_written_response() {
        let handle = handler(Step::complete(|exchange: Exchange| async move {
            exchange.send_json(StatusCode::Created, &json!({ "id": 7 }));
        }));
        let response = handle(request()).await;
        assert_eq!(response.status(), StatusCode::Created);
        assert_eq!(response.body_json(), Some(json!({ "id": 7 })));
    }

    #[tokio::test]
    async fn handler_falls_back_to_500_when_nothing_written() {
        let handle = handler(Step::halt());
        let response = handle(request()).await;
        assert_eq!(response.status(), StatusCode::InternalServerError);
        assert!(response.body().is_empty());
    }
}
