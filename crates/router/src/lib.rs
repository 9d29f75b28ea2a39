//! Prefix indexed HTTP request routing.
//!
//! Routes are compiled from `/` separated patterns (`:name` for one segment, `*name` for the rest
//! of the path) and stored per method under their leading static prefix. Matching splits the
//! request path once, scans its prefixes from the longest down to `/`, and resolves the first
//! candidate list it finds by segment count, trailing wildcard and literal segments.
//!
//! # Example
//!
//! ```
//! use http::Method;
//! use micro_router::{Lookup, Router, RouterOptions};
//!
//! let mut router = Router::new(RouterOptions::default());
//! router.add_route("files", Method::GET, "/home/*path", "files").unwrap();
//!
//! match router.lookup(&Method::GET, "/home/docs/report.json") {
//!     Lookup::Found(matched) => assert_eq!(matched.params().get("path"), Some("docs/report.json")),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

mod error;
mod method;
mod params;
mod path;
mod pattern;
mod pool;
mod route;
mod router;
mod table;
mod utils;

pub use error::RouteError;
pub use params::Params;
pub use path::SplitPath;
pub use pattern::{Pattern, Segment};
pub use pool::{Pool, Pooled, Recycle};
pub use route::Route;
pub use router::{Lookup, Matched, Router, RouterOptions};

pub(crate) use utils::ensure;
