mod fixtures;

use pretty_assertions::assert_eq;

use docbson::json::{document_from_json, document_to_json};
use docbson::validate_document;
use fixtures::{ensure_env_logger_initialized, fixture_path};

fn round_trip(relative: &str) {
    let bytes = std::fs::read(fixture_path(relative)).unwrap();
    let original: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    let doc = document_from_json(&original).unwrap();
    validate_document(doc.as_bytes()).unwrap();

    let back = document_to_json(doc.as_view()).unwrap();
    assert_eq!(back, original, "{relative}");
}

#[test]
fn test_flat_fixture_round_trips() {
    ensure_env_logger_initialized();
    round_trip("extended_bson/flat_bson.json");
}

#[test]
fn test_deep_fixture_round_trips() {
    round_trip("extended_bson/deep_bson.json");
}

#[test]
fn test_full_fixture_round_trips() {
    round_trip("extended_bson/full_bson.json");
}

#[test]
fn test_tweet_fixture_round_trips() {
    round_trip("single_and_multi_document/tweet.json");
}

#[test]
fn test_large_doc_fixture_round_trips() {
    round_trip("single_and_multi_document/large_doc.json");
}
