//! # trellis
//!
//! Composable extraction and completion steps for async HTTP request handlers.
//!
//! A handler is assembled as a pipeline of steps: extract the raw body,
//! validate it into a typed object, extract path parameters, and finally
//! produce the response. Each step either completes the response or returns
//! the next step, so handlers compose to arbitrary depth while staying plain
//! functions. The crate brings no HTTP server of its own: a composed pipeline
//! is wrapped into an async `Request -> Response` function and registered with
//! whatever server owns the route.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serde::Deserialize;
//! use trellis::http::{Method, Request};
//! use trellis::pipeline::{body, handler, respond};
//! use trellis::validate::{Rule, Schema, Validate};
//!
//! #[derive(Deserialize)]
//! struct CreateUser {
//!     name: String,
//! }
//!
//! impl Validate for CreateUser {
//!     fn schema() -> Schema {
//!         Schema::new().field("name", [Rule::NotEmpty, Rule::String, Rule::MaxLength(64)])
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let pipeline = body(|user: CreateUser| {
//!         respond(move || {
//!             let name = user.name.clone();
//!             async move { Ok::<_, std::io::Error>(serde_json::json!({ "created": name })) }
//!         })
//!     });
//!
//!     // register `handle` for exactly one route/method on your server
//!     let handle = handler(pipeline);
//!
//!     let request = Request::builder(Method::Post, "/users")
//!         .body(serde_json::json!({ "name": "ada" }))
//!         .build();
//!     let response = handle(request).await;
//!     assert_eq!(response.status().as_u16(), 200);
//! }
//! ```

// ── Modules ───────────────────────────────────────────────────────────────────
pub mod http;
pub mod pipeline;
pub mod validate;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use pipeline::{Exchange, Step, body, body_raw, handler, path_params, respond};
pub use validate::{Rule, Schema, Validate, Violation, transform_and_validate};
