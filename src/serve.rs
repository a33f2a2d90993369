//! The HTTP server.
//!
//! ```text
//!                ┌──────────── Arc<Server> ────────────┐
//!                ▼                  ▼                  ▼
//!           worker 0           worker 1    ...    worker N-1
//!                │                  │                  │
//!                └──── Site::respond (shared Arc<Site>) ┘
//! ```
//!
//! Every worker blocks on [`Server::recv`]. Ctrl+C raises the shutdown flag
//! and unblocks each worker once, after which the workers exit and
//! [`serve_site`] returns.

use anyhow::{anyhow, Context, Result};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use crate::site::{self, Site};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

const NO_STORE: [(&str, &str); 4] = [
    ("Cache-Control", "no-store, max-age=0, must-revalidate"),
    ("Pragma", "no-cache"),
    ("Expires", "0"),
    ("Surrogate-Control", "no-store"),
];

/// Serves `site` until Ctrl+C is received.
pub fn serve_site(site: Site, port: Option<u16>) -> Result<()> {
    let serve = site.config().serve.clone();
    let interface: IpAddr = serve
        .interface
        .parse()
        .with_context(|| format!("Parsing interface `{}`", serve.interface))?;
    let base_port = port.unwrap_or(serve.port);
    let workers = serve.workers.max(1);

    let (server, addr) = try_bind_port(interface, base_port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);
    let shutdown = Arc::new(AtomicBool::new(false));

    {
        let server = Arc::clone(&server);
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            log::info!("shutting down...");
            shutdown.store(true, Ordering::SeqCst);
            for _ in 0..workers {
                server.unblock();
            }
        })
        .context("Failed to set Ctrl+C handler")?;
    }

    // warm the cache before the first request
    let posts = site.repository().load_all().len();
    log::info!("serving {} posts at http://{}", posts, addr);

    let site = Arc::new(site);
    let handles: Vec<_> = (0..workers)
        .map(|i| {
            let server = Arc::clone(&server);
            let site = Arc::clone(&site);
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name(format!("http-{}", i))
                .spawn(move || worker(&server, &site, &shutdown))
        })
        .collect::<std::io::Result<_>>()
        .context("Spawning server workers")?;

    for handle in handles {
        if handle.join().is_err() {
            log::error!("a server worker panicked");
        }
    }
    Ok(())
}

fn worker(server: &Server, site: &Site, shutdown: &AtomicBool) {
    while !shutdown.load(Ordering::SeqCst) {
        match server.recv() {
            Ok(request) => {
                if let Err(e) = handle_request(request, site) {
                    log::error!("request error: {}", e);
                }
            }
            Err(e) => {
                log::error!("accepting request: {}", e);
                break;
            }
        }
    }
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log::warn!("port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        max_retries,
        base_port,
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

fn handle_request(request: Request, site: &Site) -> Result<()> {
    log::debug!("{} {}", request.method(), request.url());

    let response = match request.method() {
        Method::Get | Method::Head => site.respond(request.url()),
        _ => site::Response {
            status: 405,
            content_type: site::TEXT,
            body: b"405 Method Not Allowed".to_vec(),
        },
    };

    let headers = response_headers(&response)?;
    let mut reply = Response::from_data(response.body).with_status_code(StatusCode(response.status));
    for h in headers {
        reply.add_header(h);
    }
    // tiny_http drops the body of HEAD responses itself
    request.respond(reply).context("Writing response")?;
    Ok(())
}

/// The headers sent with `response`. HTML is never cached, by browsers or
/// by CDNs in front of the server.
fn response_headers(response: &site::Response) -> Result<Vec<Header>> {
    let mut headers = vec![header("Content-Type", response.content_type)?];
    if response.is_html() {
        for (name, value) in NO_STORE.iter() {
            headers.push(header(name, value)?);
        }
    }
    if response.status == 405 {
        headers.push(header("Allow", "GET, HEAD")?);
    }
    Ok(headers)
}

fn header(name: &str, value: &str) -> Result<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes())
        .map_err(|_| anyhow!("invalid header `{}: {}`", name, value))
}

#[cfg(test)]
mod test {
    use super::*;

    fn names_and_values(response: &site::Response) -> Vec<(String, String)> {
        response_headers(response)
            .unwrap()
            .iter()
            .map(|h| (h.field.to_string(), h.value.to_string()))
            .collect()
    }

    #[test]
    fn test_html_is_never_cached() {
        let html = site::Response::ok(site::HTML, Vec::new());
        let headers = names_and_values(&html);
        for (name, value) in NO_STORE.iter() {
            assert!(
                headers.contains(&(name.to_string(), value.to_string())),
                "missing {}: {:?}",
                name,
                headers
            );
        }
        assert!(headers.contains(&("Surrogate-Control".to_owned(), "no-store".to_owned())));
        assert!(headers.contains(&("Content-Type".to_owned(), site::HTML.to_owned())));
    }

    #[test]
    fn test_other_responses_keep_default_caching() {
        let json = site::Response::ok(site::JSON, Vec::new());
        let headers = names_and_values(&json);
        assert_eq!(vec![("Content-Type".to_owned(), site::JSON.to_owned())], headers);
    }

    #[test]
    fn test_method_not_allowed_lists_allowed_methods() {
        let response = site::Response {
            status: 405,
            content_type: site::TEXT,
            body: Vec::new(),
        };
        let headers = names_and_values(&response);
        assert!(headers.contains(&("Allow".to_owned(), "GET, HEAD".to_owned())));
    }
}
