//! Composes all four step factories into one handler and drives it against
//! synthetic requests, printing the wire-format responses.
//!
//! Run with `cargo run --example compose`. Set `RUST_LOG=trace` to watch the
//! drive loop.

use serde::Deserialize;
use trellis::http::{Method, Request};
use trellis::pipeline::{body, body_raw, handler, path_params, respond};
use trellis::validate::{Rule, Schema, Validate};

#[derive(Debug, Deserialize)]
struct CreateNote {
    title: String,
    priority: f64,
}

impl Validate for CreateNote {
    fn schema() -> Schema {
        Schema::new()
            .field("title", [Rule::NotEmpty, Rule::String, Rule::MaxLength(80)])
            .field("priority", [Rule::NotEmpty, Rule::Number])
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let pipeline = body_raw(|raw| {
        tracing::info!(%raw, "raw body observed");
        body(|note: CreateNote| {
            path_params(move |params| {
                let owner = params.get("owner").cloned().unwrap_or_default();
                let title = note.title.clone();
                let priority = note.priority;
                respond(move || {
                    let (owner, title) = (owner.clone(), title.clone());
                    async move {
                        Ok::<_, std::io::Error>(serde_json::json!({
                            "owner": owner,
                            "title": title,
                            "priority": priority,
                        }))
                    }
                })
            })
        })
    });

    let handle = handler(pipeline);

    let valid = Request::builder(Method::Post, "/notes/ada")
        .param("owner", "ada")
        .body(serde_json::json!({ "title": "water the plants", "priority": 2 }))
        .build();
    let response = handle(valid).await;
    println!(
        "--- valid request ---\n{}",
        String::from_utf8_lossy(&response.into_bytes())
    );

    let invalid = Request::builder(Method::Post, "/notes/ada")
        .param("owner", "ada")
        .body(serde_json::json!({ "title": "" }))
        .build();
    let response = handle(invalid).await;
    println!(
        "--- invalid request ---\n{}",
        String::from_utf8_lossy(&response.into_bytes())
    );
}
