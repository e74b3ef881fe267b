//! Scan-index results adapter.
//!
//! Turns an exported scan-index results file (a JSON array of deeply
//! nested result objects) into the flat [`Host`] list the dispatcher
//! consumes. The traversal is lenient the way the upstream export
//! demands - individual malformed results are logged and skipped - but
//! every skip is attributed to an explicit [`IndexError`] kind rather
//! than a silent type coercion.

use serde_json::Value;
use thiserror::Error;

use crate::host::{Host, Scheme};

/// Error kinds surfaced by the adapter.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to read results file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse results JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("results file is not a JSON array")]
    NotAnArray,

    #[error("result #{index} is missing field {field:?}")]
    MissingField { index: usize, field: &'static str },

    #[error("result #{index} field {field:?} has an unexpected type")]
    MistypedField { index: usize, field: &'static str },
}

/// Reads a results file and extracts every crawlable HTTP(S) endpoint.
///
/// Results that cannot be interpreted are skipped with a debug log; only
/// file-level problems (unreadable file, invalid JSON, wrong top-level
/// shape) fail the whole extraction.
///
/// # Errors
///
/// Returns [`IndexError::Io`], [`IndexError::Json`] or
/// [`IndexError::NotAnArray`].
pub fn extract_hosts_from_results(path: &str) -> Result<Vec<Host>, IndexError> {
    log::info!("Extracting hosts from scan-index results: {path}");

    let data = std::fs::read_to_string(path).map_err(|source| IndexError::Io {
        path: path.to_string(),
        source,
    })?;
    let results: Value = serde_json::from_str(&data)?;
    let results = results.as_array().ok_or(IndexError::NotAnArray)?;

    let mut hosts = Vec::with_capacity(results.len() * 2);
    let mut skipped = 0usize;
    for (index, result) in results.iter().enumerate() {
        match extract_result_hosts(index, result) {
            Ok(mut result_hosts) => hosts.append(&mut result_hosts),
            Err(error) => {
                log::debug!("Skipping result: {error}");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} malformed results while extracting hosts");
    }
    log::info!("Extracted {} hosts from scan-index results", hosts.len());
    Ok(hosts)
}

/// Extracts the hosts of one result object.
fn extract_result_hosts(index: usize, result: &Value) -> Result<Vec<Host>, IndexError> {
    let resource = get_object(index, result, "host_v1")
        .and_then(|host_v1| get_object(index, host_v1, "resource"))?;

    let ip = get_str(index, resource, "ip")?;

    // Prefer the reverse-DNS name for the URL when the index knows one.
    let base_address = resource
        .get("dns")
        .and_then(|dns| dns.get("reverse_dns"))
        .and_then(|rdns| dns_first_name(rdns))
        .unwrap_or(ip)
        .to_string();

    let services = match resource.get("services") {
        Some(Value::Array(services)) => services,
        Some(_) => {
            return Err(IndexError::MistypedField {
                index,
                field: "services",
            })
        }
        None => {
            return Err(IndexError::MissingField {
                index,
                field: "services",
            })
        }
    };

    let mut hosts = Vec::new();
    for service in services {
        let Some(service) = service.as_object() else {
            continue;
        };

        match service.get("endpoints").and_then(Value::as_array) {
            Some(endpoints) => {
                for endpoint in endpoints {
                    if let Some(host) = endpoint_host(&base_address, ip, endpoint) {
                        hosts.push(host);
                    }
                }
            }
            None => {
                if let Some(host) = direct_service_host(&base_address, ip, service) {
                    hosts.push(host);
                }
            }
        }
    }
    Ok(hosts)
}

/// Builds a host from an endpoint-bearing service entry.
fn endpoint_host(base_address: &str, ip: &str, endpoint: &Value) -> Option<Host> {
    let port = port_of(endpoint.get("port")?)?;

    // Only TCP endpoints are crawlable; an absent transport means TCP.
    if let Some(transport) = endpoint.get("transport_protocol").and_then(Value::as_str) {
        if transport != "tcp" {
            return None;
        }
    }

    Some(Host::new(
        base_address.to_string(),
        ip.to_string(),
        port,
        Scheme::from_port(port),
    ))
}

/// Builds a host from a service entry that carries port and protocol
/// directly.
fn direct_service_host(
    base_address: &str,
    ip: &str,
    service: &serde_json::Map<String, Value>,
) -> Option<Host> {
    let protocol = service.get("protocol").and_then(Value::as_str)?;
    if protocol != "HTTP" && protocol != "HTTPS" {
        return None;
    }
    let port = port_of(service.get("port")?)?;

    let scheme = if protocol == "HTTPS" || port == 443 {
        Scheme::Https
    } else {
        Scheme::Http
    };
    Some(Host::new(
        base_address.to_string(),
        ip.to_string(),
        port,
        scheme,
    ))
}

/// First reverse-DNS name of a `reverse_dns` object, if present.
fn dns_first_name(reverse_dns: &Value) -> Option<&str> {
    reverse_dns
        .get("names")
        .and_then(Value::as_array)?
        .first()
        .and_then(Value::as_str)
}

/// Port from a JSON number, rejecting values outside the u16 range.
fn port_of(value: &Value) -> Option<u16> {
    let port = value.as_u64()?;
    u16::try_from(port).ok()
}

fn get_object<'a>(
    index: usize,
    value: &'a Value,
    field: &'static str,
) -> Result<&'a Value, IndexError> {
    match value.get(field) {
        Some(inner) if inner.is_object() => Ok(inner),
        Some(_) => Err(IndexError::MistypedField { index, field }),
        None => Err(IndexError::MissingField { index, field }),
    }
}

fn get_str<'a>(
    index: usize,
    value: &'a Value,
    field: &'static str,
) -> Result<&'a str, IndexError> {
    match value.get(field) {
        Some(inner) => inner
            .as_str()
            .ok_or(IndexError::MistypedField { index, field }),
        None => Err(IndexError::MissingField { index, field }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_results(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp results");
        write!(file, "{json}").expect("write results");
        file
    }

    #[test]
    fn test_endpoint_results_extract_hosts() {
        let file = write_results(
            r#"[{
                "host_v1": {
                    "resource": {
                        "ip": "198.51.100.7",
                        "services": [{
                            "endpoints": [
                                {"port": 8080, "transport_protocol": "tcp"},
                                {"port": 443, "transport_protocol": "tcp"},
                                {"port": 53, "transport_protocol": "udp"}
                            ]
                        }]
                    }
                }
            }]"#,
        );

        let hosts = extract_hosts_from_results(file.path().to_str().unwrap()).expect("extract");
        assert_eq!(hosts.len(), 2, "udp endpoint must be dropped");
        assert_eq!(hosts[0].url, "http://198.51.100.7:8080");
        assert_eq!(hosts[1].url, "https://198.51.100.7");
    }

    #[test]
    fn test_direct_service_results_extract_hosts() {
        let file = write_results(
            r#"[{
                "host_v1": {
                    "resource": {
                        "ip": "203.0.113.9",
                        "services": [
                            {"protocol": "HTTP", "port": 80},
                            {"protocol": "HTTPS", "port": 8443},
                            {"protocol": "SSH", "port": 22}
                        ]
                    }
                }
            }]"#,
        );

        let hosts = extract_hosts_from_results(file.path().to_str().unwrap()).expect("extract");
        assert_eq!(hosts.len(), 2, "non-HTTP service must be dropped");
        assert_eq!(hosts[0].url, "http://203.0.113.9");
        assert_eq!(hosts[1].url, "https://203.0.113.9:8443");
    }

    #[test]
    fn test_reverse_dns_name_preferred_for_url() {
        let file = write_results(
            r#"[{
                "host_v1": {
                    "resource": {
                        "ip": "198.51.100.7",
                        "dns": {"reverse_dns": {"names": ["files.example.test"]}},
                        "services": [{"endpoints": [{"port": 80}]}]
                    }
                }
            }]"#,
        );

        let hosts = extract_hosts_from_results(file.path().to_str().unwrap()).expect("extract");
        assert_eq!(hosts[0].url, "http://files.example.test");
        assert_eq!(hosts[0].ip, "198.51.100.7");
    }

    #[test]
    fn test_ipv6_hosts_get_bracketed_urls() {
        let file = write_results(
            r#"[{
                "host_v1": {
                    "resource": {
                        "ip": "2001:db8::7",
                        "services": [{"endpoints": [{"port": 8080}]}]
                    }
                }
            }]"#,
        );

        let hosts = extract_hosts_from_results(file.path().to_str().unwrap()).expect("extract");
        assert_eq!(hosts[0].url, "http://[2001:db8::7]:8080");
    }

    #[test]
    fn test_malformed_results_are_skipped_not_fatal() {
        let file = write_results(
            r#"[
                {"unexpected": true},
                {"host_v1": {"resource": {"ip": 42, "services": []}}},
                {"host_v1": {"resource": {
                    "ip": "198.51.100.7",
                    "services": [{"endpoints": [{"port": 80}]}]
                }}}
            ]"#,
        );

        let hosts = extract_hosts_from_results(file.path().to_str().unwrap()).expect("extract");
        assert_eq!(hosts.len(), 1, "good result survives bad siblings");
    }

    #[test]
    fn test_top_level_must_be_an_array() {
        let file = write_results(r#"{"results": []}"#);
        let err = extract_hosts_from_results(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, IndexError::NotAnArray));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = extract_hosts_from_results("/nonexistent/results.json").unwrap_err();
        assert!(matches!(err, IndexError::Io { .. }));
    }

    #[test]
    fn test_field_error_kinds() {
        let missing = extract_result_hosts(0, &serde_json::json!({}));
        assert!(matches!(
            missing,
            Err(IndexError::MissingField { field: "host_v1", .. })
        ));

        let mistyped = extract_result_hosts(
            3,
            &serde_json::json!({"host_v1": {"resource": {"ip": 42}}}),
        );
        assert!(matches!(
            mistyped,
            Err(IndexError::MistypedField { field: "ip", index: 3 })
        ));
    }
}
