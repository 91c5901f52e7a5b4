// SPDX-License-Identifier: MIT OR Apache-2.0
use chartly_idempotency::{build_key, parse_key};
use serde_json::json;

#[test]
fn parse_of_build_recovers_tenant_scope_and_hash() {
    let built = build_key("TenantA", "ingest", &[json!({"k": "v"}), json!(7)]).unwrap();
    let parsed = parse_key(&built.to_string()).unwrap();

    assert_eq!(parsed.tenant(), "tenanta");
    assert_eq!(parsed.scope(), "ingest");
    assert_eq!(parsed.hash(), built.hash());
}

#[test]
fn repeated_calls_with_identical_inputs_return_the_identical_string() {
    let first = build_key("tenanta", "ingest", &[json!({"k": "v"}), json!(7)]).unwrap();
    let second = build_key("tenanta", "ingest", &[json!({"k": "v"}), json!(7)]).unwrap();
    assert_eq!(first.to_string(), second.to_string());
}
