//! `AppError` display formats and conversions.

use serde_json::json;

use logspyq::AppError;

#[test]
fn display_uses_kind_prefix() {
    assert_eq!(AppError::Config("bad".into()).to_string(), "config: bad");
    assert_eq!(AppError::Db("locked".into()).to_string(), "db: locked");
    assert_eq!(
        AppError::NotConnected("no host".into()).to_string(),
        "not connected: no host"
    );
    assert_eq!(
        AppError::Registration("x".into()).to_string(),
        "registration: x"
    );
    assert_eq!(AppError::NotFound("agent".into()).to_string(), "not found: agent");
}

#[test]
fn timeout_names_event_and_arguments() {
    let err = AppError::Timeout {
        event: "Editor.getCurrentBlock".into(),
        args: vec![json!("u1"), json!(2)],
    };
    assert!(err.is_timeout());
    assert_eq!(
        err.to_string(),
        r#"timeout: request "Editor.getCurrentBlock" ["u1",2]"#
    );
}

#[test]
fn other_kinds_are_not_timeouts() {
    assert!(!AppError::Disconnected("gone".into()).is_timeout());
    assert!(!AppError::Protocol("bad frame".into()).is_timeout());
}

#[test]
fn messages_have_no_trailing_period() {
    let err = AppError::Schema("unsupported setting type".into());
    assert!(!err.to_string().ends_with('.'));
}

#[test]
fn toml_errors_become_config_errors() {
    let err: AppError = toml::from_str::<toml::Value>("port = ").unwrap_err().into();
    assert!(matches!(err, AppError::Config(_)));
    assert!(err.to_string().starts_with("config: invalid config:"));
}

#[test]
fn json_errors_become_protocol_errors() {
    let err: AppError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
    assert!(matches!(err, AppError::Protocol(_)));
}

#[test]
fn io_errors_keep_their_message() {
    let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken");
    let err: AppError = io.into();
    assert_eq!(err.to_string(), "io: port taken");
}
