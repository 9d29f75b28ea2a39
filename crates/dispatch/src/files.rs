//! Static file and CORS preflight handlers, registered through
//! [`Routes::static_dir`](crate::Routes::static_dir), [`Routes::static_file`](crate::Routes::static_file)
//! and [`Routes::allow_cors`](crate::Routes::allow_cors).

use crate::chain::{Flow, Handler};
use crate::context::RequestContext;
use crate::error::DispatchError;
use crate::responder::PlainResponse;
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_HEADERS,
    ORIGIN, VARY,
};
use http::{Method, StatusCode};
use mime::Mime;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::error;

/// Name of the wildcard capturing the file path below a static directory.
pub(crate) const FILE_PARAM: &str = "fp";

/// Serves the files below `root`, addressed by the `*fp` capture of the route.
#[derive(Debug)]
pub struct StaticDir {
    root: PathBuf,
}

impl StaticDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps the captured path onto `root`, `None` when it tries to leave it.
    fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let mut path = self.root.clone();
        for component in relative.split(['/', '\\']).filter(|component| !component.is_empty()) {
            if component == "." || component == ".." || component.contains(':') {
                return None;
            }
            path.push(component);
        }
        Some(path)
    }
}

#[async_trait]
impl Handler for StaticDir {
    async fn call(&self, ctx: &mut RequestContext) -> Flow {
        let relative = ctx.param(FILE_PARAM).unwrap_or_default();
        match self.resolve(relative) {
            Some(path) => serve_path(ctx, &path).await,
            None => StatusCode::NOT_FOUND.into(),
        }
    }
}

/// Serves a single file.
#[derive(Debug)]
pub struct StaticFile {
    file: PathBuf,
}

impl StaticFile {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into() }
    }
}

#[async_trait]
impl Handler for StaticFile {
    async fn call(&self, ctx: &mut RequestContext) -> Flow {
        serve_path(ctx, &self.file).await
    }
}

async fn serve_path(ctx: &RequestContext, path: &Path) -> Flow {
    match read_file(path).await {
        Ok((content_type, body)) => PlainResponse::new(content_type, body).into(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => StatusCode::NOT_FOUND.into(),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => StatusCode::FORBIDDEN.into(),
        Err(e) => {
            error!(cause = %e, path = %path.display(), request = ctx.path(), "failed to read static file");
            StatusCode::INTERNAL_SERVER_ERROR.into()
        }
    }
}

/// Reads `path`, or the `index.html` inside it when it is a directory.
async fn read_file(path: &Path) -> io::Result<(Mime, Bytes)> {
    let metadata = fs::metadata(path).await?;
    let path = if metadata.is_dir() { path.join("index.html") } else { path.to_path_buf() };

    let body = fs::read(&path).await?;
    Ok((content_type(&path), Bytes::from(body)))
}

fn content_type(path: &Path) -> Mime {
    let extension = path.extension().and_then(|extension| extension.to_str()).unwrap_or_default().to_ascii_lowercase();
    match extension.as_str() {
        "html" | "htm" => mime::TEXT_HTML_UTF_8,
        "css" => mime::TEXT_CSS_UTF_8,
        "js" | "mjs" => mime::APPLICATION_JAVASCRIPT_UTF_8,
        "json" => mime::APPLICATION_JSON,
        "txt" => mime::TEXT_PLAIN_UTF_8,
        "csv" => mime::TEXT_CSV_UTF_8,
        "xml" => mime::TEXT_XML,
        "png" => mime::IMAGE_PNG,
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "gif" => mime::IMAGE_GIF,
        "bmp" => mime::IMAGE_BMP,
        "svg" => mime::IMAGE_SVG,
        "woff" => mime::FONT_WOFF,
        "woff2" => mime::FONT_WOFF2,
        "pdf" => mime::APPLICATION_PDF,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

/// Answers CORS preflight requests with `204 No Content`.
///
/// The request `Origin` is echoed back (`*` without one) and the requested headers are allowed.
#[derive(Debug)]
pub struct AllowCors {
    methods: String,
}

impl AllowCors {
    pub fn new(methods: &[Method]) -> Self {
        let methods = methods.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
        Self { methods }
    }

    fn write_headers(&self, ctx: &mut RequestContext) -> Result<(), DispatchError> {
        let origin = ctx.headers().get(ORIGIN).cloned();
        let requested = ctx.headers().get(ACCESS_CONTROL_REQUEST_HEADERS).cloned();

        match origin {
            Some(origin) => {
                ctx.set_header(ACCESS_CONTROL_ALLOW_ORIGIN, origin)?;
                ctx.set_header(VARY, "Origin")?;
            }
            None => ctx.set_header(ACCESS_CONTROL_ALLOW_ORIGIN, "*")?,
        }
        ctx.set_header(ACCESS_CONTROL_ALLOW_METHODS, self.methods.as_str())?;
        if let Some(requested) = requested {
            ctx.set_header(ACCESS_CONTROL_ALLOW_HEADERS, requested)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Handler for AllowCors {
    async fn call(&self, ctx: &mut RequestContext) -> Flow {
        if let Err(e) = self.write_headers(ctx) {
            error!(cause = %e, path = ctx.path(), "failed to write cors headers");
            return StatusCode::INTERNAL_SERVER_ERROR.into();
        }
        StatusCode::NO_CONTENT.into()
    }
}
