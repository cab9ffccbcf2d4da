//! Wire-shape tests for schema types
//!
//! These pin the JSON field names and tags that the CLI prints and that
//! configuration files use.

use crate::*;
use serde_json::json;
use std::collections::BTreeMap;

#[test]
fn test_process_state_tags() {
    let value = serde_json::to_value(ProcessState::Signaled {
        signal: 9,
        core_dumped: false,
    })
    .expect("serialize");
    assert_eq!(
        value,
        json!({ "state": "signaled", "signal": 9, "coreDumped": false })
    );

    let value = serde_json::to_value(ProcessState::Running).expect("serialize");
    assert_eq!(value, json!({ "state": "running" }));
}

#[test]
fn test_spawn_request_defaults() {
    let req: SpawnRequest =
        serde_json::from_value(json!({ "program": "/bin/true" })).expect("deserialize");
    assert_eq!(req, SpawnRequest::new("/bin/true"));
}

#[test]
fn test_env_policy_adjacent_tagging() {
    let req: SpawnRequest = serde_json::from_value(json!({
        "program": "env",
        "searchPath": true,
        "env": { "policy": "replace", "vars": { "LANG": "C" } }
    }))
    .expect("deserialize");
    assert!(req.search_path);
    assert_eq!(
        req.env,
        EnvPolicy::Replace(BTreeMap::from([("LANG".to_string(), "C".to_string())]))
    );

    let inherit: EnvPolicy =
        serde_json::from_value(json!({ "policy": "inherit" })).expect("deserialize");
    assert_eq!(inherit, EnvPolicy::Inherit);
}

#[test]
fn test_child_id_rejects_zero_on_deserialize() {
    assert!(serde_json::from_value::<ChildId>(json!(0)).is_err());
    let id: ChildId = serde_json::from_value(json!(77)).expect("deserialize");
    assert_eq!(id.as_raw(), 77);
    assert_eq!(serde_json::to_value(id).expect("serialize"), json!(77));
}
