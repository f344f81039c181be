use std::{net::IpAddr, str::FromStr};

use actix_web::dev::ServiceRequest;
use log::{debug, trace};
use once_cell::sync::Lazy;
use regex::Regex;

static FORWARDED_FOR: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r#"(?i)for="?\[?(?P<ip>[0-9A-Fa-f:.]+?)\]?(:\d+)?"?(;|,|$)"#).unwrap()
});

/// Get the remote IP address of a request. Three sources are consulted, in decreasing order of preference:
/// 1. The first address in the `X-Forwarded-For` header, iif `use_x_forwarded_for` is set.
/// 2. The first `for=` entry in the `Forwarded` header, iif `use_forwarded` is set.
/// 3. The peer address from the connection info.
pub fn get_remote_ip(req: &ServiceRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        result = req.headers().get("X-Forwarded-For").and_then(|v| v.to_str().ok()).and_then(parse_x_forwarded_for);
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    if use_forwarded && result.is_none() {
        trace!("Checking Forwarded header");
        result = req.headers().get("Forwarded").and_then(|v| v.to_str().ok()).and_then(parse_forwarded);
        if let Some(ip) = result {
            debug!("Using Forwarded header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.peer_addr().map(|a| a.ip());
        trace!("Using Peer address for remote address: {:?}", peer_addr);
        peer_addr
    })
}

fn parse_x_forwarded_for(value: &str) -> Option<IpAddr> {
    value.split(',').next().map(str::trim).and_then(|s| IpAddr::from_str(s).ok())
}

fn parse_forwarded(value: &str) -> Option<IpAddr> {
    FORWARDED_FOR
        .captures(value)
        .and_then(|caps| caps.name("ip"))
        .map(|m| m.as_str())
        .and_then(|s| IpAddr::from_str(s).ok())
}
