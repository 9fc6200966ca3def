//! Plain HTTP endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Entry page with the live signal display |
//! | `GET` | `/healthz` | Liveness probe |

use axum::response::Html;

/// The entry page, compiled into the binary.
const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Serve the entry page. Its script connects to `/ws` and renders both
/// axes as updates arrive.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Liveness probe.
pub async fn healthz() -> &'static str {
    "ok"
}
