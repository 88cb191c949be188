//! Reply normalization.

use serde::Deserialize;
use serde_json::json;

use logspyq::models::Reply;
use logspyq::AppError;

#[test]
fn objects_become_keyed_replies() {
    let reply = Reply::from_value(json!({"uuid": "b1", "level": 2}));
    assert_eq!(reply.get_str("uuid"), Some("b1"));
    assert_eq!(reply.get("level"), Some(&json!(2)));
    assert!(reply.as_list().is_none());
}

#[test]
fn arrays_become_ordered_lists() {
    let reply = Reply::from_value(json!(["a", {"k": 1}]));
    assert_eq!(reply.as_list().map(<[_]>::len), Some(2));
    let elements = reply.elements();
    assert_eq!(elements[0].as_str(), Some("a"));
    assert_eq!(elements[1].get("k"), Some(&json!(1)));
}

#[test]
fn null_and_sentinel_are_absent() {
    assert!(Reply::from_value(json!(null)).is_absent());
    assert!(Reply::from_value(json!("null")).is_absent());
    assert!(!Reply::from_value(json!("nullable")).is_absent());
}

#[test]
fn scalars_pass_through() {
    assert_eq!(Reply::from_value(json!(true)).as_bool(), Some(true));
    assert_eq!(Reply::from_value(json!(3)), Reply::Scalar(json!(3)));
}

#[test]
fn absent_round_trips_to_null() {
    assert_eq!(Reply::Absent.into_value(), json!(null));
}

#[derive(Debug, Deserialize, PartialEq)]
struct Block {
    uuid: String,
    content: String,
}

#[test]
fn decode_into_typed_struct() {
    let reply = Reply::from_value(json!({"uuid": "b1", "content": "hi", "extra": 0}));
    let block: Block = reply.decode().unwrap();
    assert_eq!(
        block,
        Block {
            uuid: "b1".into(),
            content: "hi".into()
        }
    );
}

#[test]
fn decode_wrong_shape_is_protocol_error() {
    let err = Reply::from_value(json!([1])).decode::<Block>().unwrap_err();
    assert!(matches!(err, AppError::Protocol(_)));
}
