//! Same-origin guard for the local dashboard.
//!
//! The dashboard listens on a TCP port, so any page in the user's browser can
//! reach it. Requests must name the bound address in `Host`, and state-changing
//! requests must also carry an `Origin` (or, failing that, `Referer`) on that
//! address.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct LocalOrigin {
    hosts: Arc<Vec<String>>,
}

impl LocalOrigin {
    /// Accepted `Host` values for a listener bound to `addr`. Loopback and
    /// wildcard binds also accept `localhost` and `127.0.0.1` on the same port.
    pub fn for_addr(addr: SocketAddr) -> Self {
        let port = addr.port();
        let mut hosts = vec![addr.to_string()];
        if addr.ip().is_loopback() || addr.ip().is_unspecified() {
            for alias in [
                format!("localhost:{port}"),
                format!("127.0.0.1:{port}"),
                format!("[::1]:{port}"),
            ] {
                if !hosts.contains(&alias) {
                    hosts.push(alias);
                }
            }
        }
        Self {
            hosts: Arc::new(hosts),
        }
    }

    fn allows_host(&self, host: &str) -> bool {
        let host = host.trim();
        self.hosts.iter().any(|h| h.eq_ignore_ascii_case(host))
    }

    /// `http://<host>` with an optional path, as sent in `Origin`/`Referer`.
    fn allows_url(&self, url: &str) -> bool {
        let Some(rest) = url.trim().strip_prefix("http://") else {
            return false;
        };
        let authority = rest.split('/').next().unwrap_or_default();
        self.allows_host(authority)
    }

    fn allows_writer(&self, headers: &HeaderMap) -> bool {
        let value = |name: header::HeaderName| headers.get(name).and_then(|v| v.to_str().ok());
        match (value(header::ORIGIN), value(header::REFERER)) {
            (Some(origin), _) => self.allows_url(origin),
            (None, Some(referer)) => self.allows_url(referer),
            (None, None) => false,
        }
    }
}

pub async fn require_local_origin(
    State(local): State<LocalOrigin>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let headers = req.headers();
    let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());
    if !host.is_some_and(|h| local.allows_host(h)) {
        tracing::warn!(host = host.unwrap_or_default(), "rejected request for a foreign host");
        return Err(StatusCode::FORBIDDEN);
    }

    let read_only = matches!(*req.method(), Method::GET | Method::HEAD);
    if !read_only && !local.allows_writer(headers) {
        tracing::warn!(
            method = %req.method(),
            path = %req.uri().path(),
            "rejected cross-origin form post"
        );
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(req).await)
}
