// ABOUTME: SSRF guard validating user-supplied platform URLs before any outbound request
// ABOUTME: Enforces HTTPS and blocks private, loopback, link-local, and internal hosts
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # SSRF Guard
//!
//! Self-hosted platforms (IServ, Moodle) take their instance URL from user
//! config, so a hostile value could point the engine at loopback, RFC 1918
//! space, or the cloud metadata endpoint. [`validate_platform_url`] must run
//! against every user-supplied server URL before its first network use —
//! per call, not once globally, since config can change between calls.
//!
//! Error messages are user-facing and intentionally German, matching the
//! product surface; their literal prefixes (`Ungültige URL`, `Nur HTTPS`,
//! `Private`) are part of the caller contract.

use crate::errors::{AppError, AppResult};
use url::Url;

/// Hostname suffixes that always denote internal infrastructure
const BLOCKED_SUFFIXES: &[&str] = [".local", ".internal"].as_slice();

/// Validate a user-supplied platform URL before outbound use
///
/// Rules, in order: the URL must parse; the scheme must be exactly `https`;
/// the host must not be loopback, RFC 1918 private space, link-local
/// (cloud metadata), or an internal-suffix name.
///
/// # Errors
///
/// Returns a [`crate::errors::ErrorCode::UrlBlocked`] error naming the
/// violated rule. No network call may be issued with this URL once an error
/// is returned.
pub fn validate_platform_url(raw: &str) -> AppResult<()> {
    let url = Url::parse(raw)
        .map_err(|_| AppError::url_blocked(format!("Ungültige URL: {raw}")))?;

    if url.scheme() != "https" {
        return Err(AppError::url_blocked(
            "Nur HTTPS-Verbindungen sind erlaubt",
        ));
    }

    let host = url
        .host_str()
        .ok_or_else(|| AppError::url_blocked(format!("Ungültige URL: {raw}")))?
        .to_lowercase();
    // url::Url keeps IPv6 literals bracketed in host_str
    let host = host.trim_start_matches('[').trim_end_matches(']');

    if is_blocked_host(host) {
        return Err(AppError::url_blocked(format!(
            "Private und interne Adressen sind nicht erlaubt: {host}"
        )));
    }

    Ok(())
}

/// Whether a lowercased hostname falls into a blocked range
fn is_blocked_host(host: &str) -> bool {
    if host == "localhost" || host == "::1" {
        return true;
    }
    if BLOCKED_SUFFIXES.iter().any(|suffix| host.ends_with(suffix)) {
        return true;
    }
    if host.starts_with("127.")
        || host.starts_with("10.")
        || host.starts_with("192.168.")
        || host.starts_with("169.254.")
    {
        return true;
    }
    // 172.16.0.0/12: second octet 16 through 31 inclusive
    if let Some(rest) = host.strip_prefix("172.") {
        if let Some((octet, _)) = rest.split_once('.') {
            if let Ok(value) = octet.parse::<u16>() {
                return (16..=31).contains(&value);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_https_hosts_pass() {
        assert!(validate_platform_url("https://school.iserv.de").is_ok());
        assert!(validate_platform_url("https://moodle.example-schule.de/moodle").is_ok());
    }

    #[test]
    fn test_plain_http_is_rejected() {
        let error = validate_platform_url("http://school.iserv.de").unwrap_err();
        assert!(error.to_string().contains("Nur HTTPS"));
    }

    #[test]
    fn test_unparseable_url_is_rejected() {
        let error = validate_platform_url("not a url").unwrap_err();
        assert!(error.to_string().contains("Ungültige URL"));
    }

    #[test]
    fn test_172_range_boundaries() {
        assert!(validate_platform_url("https://172.16.0.1").is_err());
        assert!(validate_platform_url("https://172.31.255.255").is_err());
        // Just outside the /12
        assert!(validate_platform_url("https://172.15.0.1").is_ok());
        assert!(validate_platform_url("https://172.32.0.1").is_ok());
    }

    #[test]
    fn test_metadata_endpoint_is_blocked() {
        let error = validate_platform_url("https://169.254.169.254").unwrap_err();
        assert!(error.to_string().contains("Private"));
    }

    #[test]
    fn test_ipv6_loopback_is_blocked() {
        assert!(validate_platform_url("https://[::1]").is_err());
    }
}
