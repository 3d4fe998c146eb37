//! Step factories: the async completion adapter and the request extractors.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::http::StatusCode;
use crate::validate::{Validate, transform_and_validate};

use super::Step;

/// Builds a terminal step from a future-producing function.
///
/// Invoking the step calls `f` immediately to obtain the future. When it
/// resolves to `Ok(value)`, the response is `200 OK` with `value` serialized
/// as the JSON body, including `null` and empty objects. When it resolves to
/// `Err(_)`, the response is a bare `500` with no body; the error itself is
/// deliberately not reported. Exactly one of the two writes happens per
/// invocation, and no error escapes the adapter.
///
/// # Examples
///
/// ```
/// use trellis::pipeline::respond;
///
/// let step = respond(|| async { Ok::<_, std::io::Error>(serde_json::json!({ "ok": true })) });
/// # let _ = step;
/// ```
pub fn respond<F, Fut, T, E>(f: F) -> Step
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Serialize + Send + 'static,
    E: Send + 'static,
{
    Step::complete(move |exchange| {
        // obtain the future before suspending, so `f` runs at invocation time
        let fut = f();
        async move {
            match fut.await {
                Ok(value) => exchange.send_json(StatusCode::Ok, &value),
                Err(_) => {
                    debug!("completion future failed, sending bare 500");
                    exchange.send_status(StatusCode::InternalServerError);
                }
            }
        }
    })
}

/// Exposes the unvalidated request body to a continuation-producing function.
///
/// Pure pass-through: the opaque JSON value is handed to `f` as-is, and the
/// step `f` returns is driven with the same exchange. Nothing is caught here;
/// a panic in `f` propagates to the pipeline's caller.
pub fn body_raw<F>(f: F) -> Step
where
    F: Fn(Value) -> Step + Send + Sync + 'static,
{
    Step::nested(move |exchange| f(exchange.request().body().clone()))
}

/// Validates the request body against `T`'s schema before exposing it.
///
/// On success the typed instance is handed to `f` and the returned step is
/// driven with the same exchange. On any constraint failure `f` is never
/// called; the response is `500` with the full ordered violation list as the
/// JSON body. The uniform 500 (rather than 400 for bad input) is documented
/// behavior inherited from the adapter's history; callers depend on it.
///
/// # Examples
///
/// ```
/// use serde::Deserialize;
/// use trellis::pipeline::{body, respond};
/// use trellis::validate::{Rule, Schema, Validate};
///
/// #[derive(Deserialize)]
/// struct CreateUser {
///     name: String,
/// }
///
/// impl Validate for CreateUser {
///     fn schema() -> Schema {
///         Schema::new().field("name", [Rule::NotEmpty, Rule::String, Rule::MaxLength(64)])
///     }
/// }
///
/// let step = body(|user: CreateUser| {
///     respond(move || {
///         let name = user.name.clone();
///         async move { Ok::<_, std::io::Error>(serde_json::json!({ "created": name })) }
///     })
/// });
/// # let _ = step;
/// ```
pub fn body<T, F>(f: F) -> Step
where
    T: Validate + Send + 'static,
    F: Fn(T) -> Step + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Step::async_nested(move |exchange| {
        let f = Arc::clone(&f);
        async move {
            match transform_and_validate::<T>(exchange.request().body()).await {
                Ok(instance) => f(instance),
                Err(failure) => {
                    debug!(
                        violations = failure.violations().len(),
                        "request body failed validation"
                    );
                    exchange.send_json(StatusCode::InternalServerError, failure.violations());
                    Step::halt()
                }
            }
        }
    })
}

/// Exposes the parsed path parameters to a continuation-producing function.
///
/// The map is empty, never absent, when the route has no captures. Values
/// stay strings; numeric-looking segments are not coerced, callers convert
/// themselves where needed.
pub fn path_params<F>(f: F) -> Step
where
    F: Fn(HashMap<String, String>) -> Step + Send + Sync + 'static,
{
    Step::nested(move |exchange| f(exchange.request().params().clone()))
}
