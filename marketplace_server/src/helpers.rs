use std::{net::IpAddr, str::FromStr};

use actix_web::HttpRequest;
use log::{debug, trace};
use regex::Regex;

/// Works out where a request came from. Proxy headers are only trusted when the configuration says so, in this order:
/// 1. The first address in `X-Forwarded-For`, if `use_x_forwarded_for` is set.
/// 2. The first `for=` element of `Forwarded`, if `use_forwarded` is set.
/// 3. The peer address of the connection.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok());
    let from_proxy = use_x_forwarded_for
        .then(|| header("X-Forwarded-For").and_then(first_forwarded_for))
        .flatten()
        .inspect(|ip| debug!("Using X-Forwarded-For header for remote address: {ip}"))
        .or_else(|| {
            use_forwarded
                .then(|| header("Forwarded").and_then(forwarded_for))
                .flatten()
                .inspect(|ip| debug!("Using Forwarded header for remote address: {ip}"))
        });
    from_proxy.or_else(|| {
        let peer_addr = req.connection_info().peer_addr().map(|a| a.to_string());
        trace!("Using peer address for remote address: {peer_addr:?}");
        peer_addr.and_then(|s| IpAddr::from_str(&s).ok())
    })
}

/// `X-Forwarded-For: client, proxy1, proxy2`
fn first_forwarded_for(value: &str) -> Option<IpAddr> {
    value.split(',').next().and_then(|s| IpAddr::from_str(s.trim()).ok())
}

/// `Forwarded: for=192.0.2.60;proto=http;by=203.0.113.43`
fn forwarded_for(value: &str) -> Option<IpAddr> {
    let re = Regex::new(r#"for="?(?P<ip>[^;,"]+)"#).ok()?;
    re.captures(value).and_then(|caps| caps.name("ip")).and_then(|m| IpAddr::from_str(m.as_str()).ok())
}
