// Unit tests for the configuration surface

use crate::config::{PROXY_URL_ENV, ProxyConfig, TRAFFIC_LOG_ENV, parse_flag};
use crate::{DEFAULT_PROXY_ENDPOINT, PROXY_PORT};

use serial_test::serial;

#[test]
fn given_no_overrides_when_from_vars_then_defaults() {
    let config = ProxyConfig::from_vars(|_| None).expect("defaults are valid");

    assert_eq!(config.endpoint.as_str(), DEFAULT_PROXY_ENDPOINT);
    assert_eq!(config.endpoint.port(), Some(PROXY_PORT));
    assert!(!config.traffic_log);
}

#[test]
fn given_endpoint_override_when_from_vars_then_used() {
    let config = ProxyConfig::from_vars(|name| {
        (name == PROXY_URL_ENV).then(|| "ws://127.0.0.1:9999".to_string())
    })
    .expect("override is valid");

    assert_eq!(config.endpoint.port(), Some(9999));
}

#[test]
fn given_http_endpoint_when_from_vars_then_invalid() {
    let result = ProxyConfig::from_vars(|name| {
        (name == PROXY_URL_ENV).then(|| "http://127.0.0.1:41949".to_string())
    });

    assert!(result.is_err());
}

#[test]
fn given_unparseable_endpoint_when_from_vars_then_invalid() {
    let result =
        ProxyConfig::from_vars(|name| (name == PROXY_URL_ENV).then(|| "not a url".to_string()));

    assert!(result.is_err());
}

#[test]
fn given_traffic_flag_when_from_vars_then_parsed() {
    let config = ProxyConfig::from_vars(|name| {
        (name == TRAFFIC_LOG_ENV).then(|| "true".to_string())
    })
    .expect("valid");

    assert!(config.traffic_log);
}

#[test]
fn given_flag_spellings_when_parse_flag_then_recognized() {
    assert!(parse_flag("1"));
    assert!(parse_flag("true"));
    assert!(parse_flag("ON"));
    assert!(!parse_flag("0"));
    assert!(!parse_flag("false"));
    assert!(!parse_flag(""));
    // Unrecognized values disable, with a warning.
    assert!(!parse_flag("banana"));
}

/// The process-environment path, kept serial because it mutates env state.
#[test]
#[serial]
fn given_env_override_when_from_env_then_endpoint_used() {
    unsafe {
        std::env::set_var(PROXY_URL_ENV, "ws://127.0.0.1:4242");
    }

    let config = ProxyConfig::from_env().expect("override is valid");
    assert_eq!(config.endpoint.port(), Some(4242));

    unsafe {
        std::env::remove_var(PROXY_URL_ENV);
    }
}
