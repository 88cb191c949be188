//! Settings schema rendering and snapshot reloads.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use logspyq::agent::{Agent, SettingType, Settings, SettingsSchema};
use logspyq::transport::Transport;
use logspyq::AppError;

fn demo_schema() -> SettingsSchema {
    SettingsSchema::new()
        .setting("max_results", 5, "How many results")
        .setting("query", "rust", "Default query")
        .setting("enabled_sources", json!({"web": true}), "Sources")
        .setting("verbose", false, "Log more")
}

fn persisted(items: &[(&str, &str)]) -> HashMap<String, String> {
    items
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

#[test]
fn render_infers_types_from_defaults() {
    let rendered = demo_schema().render().unwrap();
    let types: Vec<SettingType> = rendered.iter().map(|d| d.setting_type).collect();
    assert_eq!(
        types,
        vec![
            SettingType::Number,
            SettingType::String,
            SettingType::Object,
            SettingType::Boolean
        ]
    );
    assert_eq!(rendered[0].title, "Max Results");
}

#[test]
fn unsupported_declared_type_fails_rendering() {
    let schema = SettingsSchema::new().typed("when", "date", "2024-01-01", "A date");
    let err = schema.render().unwrap_err();
    assert!(matches!(err, AppError::Schema(_)));
    assert!(err.to_string().contains("when"));
}

#[test]
fn array_default_fails_rendering() {
    let schema = SettingsSchema::new().setting("tags", json!(["a"]), "Tags");
    assert!(matches!(schema.render(), Err(AppError::Schema(_))));
}

#[test]
fn agent_build_rejects_bad_schema_before_any_traffic() {
    let transport = Arc::new(Transport::default());
    let result = Agent::builder("bad")
        .settings(SettingsSchema::new().typed("x", "list", json!([]), "bad"))
        .build(transport);
    assert!(matches!(result, Err(AppError::Schema(_))));
}

#[test]
fn persisted_text_overrides_defaults() {
    let schema = demo_schema();
    let next = schema
        .defaults()
        .reloaded(&schema, &persisted(&[("max_results", "7"), ("verbose", "True")]));
    assert_eq!(next.get_i64("max_results"), Some(7));
    assert_eq!(next.get_bool("verbose"), Some(true));
    assert_eq!(next.get_str("query"), Some("rust"));
    assert_eq!(next.version(), 1);
}

#[test]
fn unparseable_value_keeps_default() {
    let schema = demo_schema();
    let next = schema.defaults().reloaded(
        &schema,
        &persisted(&[("max_results", "many"), ("enabled_sources", "[1]")]),
    );
    assert_eq!(next.get_i64("max_results"), Some(5));
    assert_eq!(next.get("enabled_sources"), Some(&json!({"web": true})));
}

#[test]
fn undeclared_keys_are_ignored() {
    let schema = demo_schema();
    let next = schema
        .defaults()
        .reloaded(&schema, &persisted(&[("stranger", "1")]));
    assert!(next.get("stranger").is_none());
}

#[test]
fn reload_never_mutates_the_old_snapshot() {
    let transport = Arc::new(Transport::default());
    let agent = Agent::builder("demo")
        .settings(demo_schema())
        .build(transport)
        .unwrap();
    let old: Arc<Settings> = agent.settings();

    let new = agent.apply_settings(&persisted(&[("max_results", "9")]));
    assert_eq!(old.get_i64("max_results"), Some(5));
    assert_eq!(new.get_i64("max_results"), Some(9));
    assert_eq!(new.version(), old.version() + 1);
}

#[test]
fn redeclaring_a_key_replaces_it() {
    let schema = SettingsSchema::new()
        .setting("limit", 1, "first")
        .setting("limit", 2, "second");
    assert_eq!(schema.decls().len(), 1);
    assert_eq!(schema.defaults().get_i64("limit"), Some(2));
}
