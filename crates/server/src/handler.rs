//! Request routing for the shared file.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use hyper::body::Incoming;
use hyper::header::{ALLOW, CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};
use hyper::{Method, Request, Response, StatusCode};
use tokio::sync::Notify;

use crate::body::{self, ShareBody};
use crate::content_type::content_type_for;
use crate::file::SharedFile;

/// State shared by every connection of one server.
pub(crate) struct ShareState {
    pub(crate) file: SharedFile,
    content_type: HeaderValue,
    downloads: AtomicU64,
    /// Signalled after each completed download.
    pub(crate) completed: Notify,
}

impl ShareState {
    pub(crate) fn new(file: SharedFile) -> Self {
        let content_type = HeaderValue::from_str(&content_type_for(file.path()))
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
        Self {
            file,
            content_type,
            downloads: AtomicU64::new(0),
            completed: Notify::new(),
        }
    }

    pub(crate) fn downloads(&self) -> u64 {
        self.downloads.load(Ordering::SeqCst)
    }

    fn record_download(&self) {
        let n = self.downloads.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(file = %self.file.name(), downloads = n, "download complete");
        self.completed.notify_one();
    }
}

/// hyper service entry point.
pub(crate) async fn handle(
    req: Request<Incoming>,
    state: Arc<ShareState>,
    peer_addr: SocketAddr,
) -> Result<Response<ShareBody>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    drop(req);

    let response = respond(&method, &path, &state).await;
    tracing::info!(
        %peer_addr,
        %method,
        %path,
        status = response.status().as_u16(),
        "request"
    );
    Ok(response)
}

pub(crate) async fn respond(
    method: &Method,
    path: &str,
    state: &Arc<ShareState>,
) -> Response<ShareBody> {
    if !state.file.matches_path(path) {
        return not_found();
    }

    let head_only = match *method {
        Method::GET => false,
        Method::HEAD => true,
        _ => return method_not_allowed(),
    };

    let file = match tokio::fs::File::open(state.file.path()).await {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(path = %state.file.path().display(), "cannot open shared file: {e}");
            return not_found();
        }
    };
    let len = match file.metadata().await {
        Ok(meta) => meta.len(),
        Err(e) => {
            tracing::warn!(path = %state.file.path().display(), "cannot stat shared file: {e}");
            return not_found();
        }
    };

    let body = if head_only {
        body::empty()
    } else {
        let state = Arc::clone(state);
        body::file(file, len, Box::new(move || state.record_download()))
    };

    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, state.content_type.clone());
    headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
    response
}

fn not_found() -> Response<ShareBody> {
    status_response(StatusCode::NOT_FOUND, "File not found")
}

fn method_not_allowed() -> Response<ShareBody> {
    let mut response = status_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
    response
}

fn status_response(status: StatusCode, msg: &'static str) -> Response<ShareBody> {
    let mut response = Response::new(body::text(msg));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
