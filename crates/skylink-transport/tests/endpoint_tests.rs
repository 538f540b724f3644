//! Endpoint parsing tests

use skylink_transport::{Endpoint, TransportError};

#[test]
fn test_explicit_port_wins() {
    let ep: Endpoint = "ws://192.168.1.10:8080/ws".parse().expect("parse failed");
    assert_eq!(ep.host(), "192.168.1.10");
    assert_eq!(ep.port(), 8080);
    assert_eq!(ep.path(), "/ws");
    assert!(!ep.is_secure());
}

#[test]
fn test_secure_default_port() {
    let ep = Endpoint::parse("wss://iot.example.com").expect("parse failed");
    assert_eq!(ep.port(), 443);
    assert_eq!(ep.path(), "/");
    assert_eq!(ep.scheme(), "wss");
    assert_eq!(ep.to_string(), "wss://iot.example.com:443/");
}

#[test]
fn test_query_is_kept() {
    let ep = Endpoint::parse("ws://iot.example.com/device?v=2").expect("parse failed");
    assert_eq!(ep.path(), "/device?v=2");
}

#[test]
fn test_rejects_other_schemes() {
    match Endpoint::parse("http://iot.example.com/") {
        Err(TransportError::UnsupportedScheme(scheme)) => assert_eq!(scheme, "http"),
        other => panic!("expected UnsupportedScheme, got {:?}", other),
    }
}

#[test]
fn test_rejects_garbage() {
    assert!(matches!(
        Endpoint::parse("not a url"),
        Err(TransportError::InvalidUrl(_))
    ));
}

#[test]
fn test_display_roundtrip() {
    let ep = Endpoint::parse("ws://localhost:7330/device").expect("parse failed");
    let again = Endpoint::parse(&ep.to_string()).expect("reparse failed");
    assert_eq!(ep, again);
}
