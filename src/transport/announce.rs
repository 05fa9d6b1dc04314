//! Human-facing URL for a running host. Never affects the bind address.

use std::net::Ipv6Addr;

use super::local::get_local_ip;

/// Hosting platforms that publish the externally routable URL through the
/// environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// `REPL_SLUG` + `REPL_OWNER`
    Replit,
}

impl Platform {
    fn url(&self, env: &dyn Fn(&str) -> Option<String>) -> Option<String> {
        match self {
            Platform::Replit => {
                let slug = env("REPL_SLUG").filter(|s| !s.is_empty())?;
                let owner = env("REPL_OWNER").filter(|s| !s.is_empty())?;
                Some(format!("https://{slug}.{owner}.repl.co"))
            }
        }
    }
}

const PLATFORMS: [Platform; 1] = [Platform::Replit];

/// Pick the URL to print: explicit override, then a platform URL, then the
/// local network address.
pub fn announce_url(configured: Option<&str>, bind_address: &str, port: u16) -> String {
    resolve_url(configured, bind_address, port, &|key: &str| std::env::var(key).ok(), &|| {
        get_local_ip().ok()
    })
}

fn resolve_url(
    configured: Option<&str>,
    bind_address: &str,
    port: u16,
    env: &dyn Fn(&str) -> Option<String>,
    local_ip: &dyn Fn() -> Option<String>,
) -> String {
    if let Some(url) = configured {
        return url.trim_end_matches('/').to_string();
    }

    if let Some(url) = PLATFORMS.iter().find_map(|p| p.url(env)) {
        return url;
    }

    let host = match bind_address {
        // wildcard binds are reachable on the LAN address
        "0.0.0.0" | "::" | "[::]" => local_ip().unwrap_or_else(|| "127.0.0.1".to_string()),
        other => other.to_string(),
    };
    // IPv6 literals need brackets in a URL authority
    if host.parse::<Ipv6Addr>().is_ok() {
        format!("http://[{host}]:{port}")
    } else {
        format!("http://{host}:{port}")
    }
}
