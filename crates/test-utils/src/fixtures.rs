//! Canned payloads and scenario files for TrackMe tests.

use std::io::Write;

use serde_json::{json, Value};
use tempfile::NamedTempFile;

/// Scenario that runs briefly against whatever host the test substitutes.
pub const SHORT_SCENARIO: &str = r#"
name: Short smoke
description: Two seconds of mixed traffic
host: http://127.0.0.1:9
users: 3
spawn_rate: 50.0
duration_secs: 2
seed: 7
actors:
  standard:
    weight: 1
    wait_min_secs: 0.01
    wait_max_secs: 0.05
  privileged:
    weight: 1
    wait_min_secs: 0.01
    wait_max_secs: 0.05
thresholds:
  max_failure_rate: 0.5
"#;

/// Write `yaml` to a temporary `.yaml` file that lives as long as the handle.
pub fn scenario_file(yaml: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("Failed to create scenario file");
    file.write_all(yaml.as_bytes())
        .expect("Failed to write scenario file");
    file
}

/// A client as the TrackMe API returns it, built from a create/update payload.
///
/// `app`, `last_login` and each contract's `autopayment` come back wrapped in
/// objects, and `stage` is reported as `current_stage`.
pub fn server_client(id: &str, request: &Value) -> Value {
    let contracts: Vec<Value> = request["contracts"]
        .as_array()
        .map(|contracts| {
            contracts
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    json!({
                        "id": format!("{}-contract-{}", id, i),
                        "name": c["name"].clone(),
                        "number": c["number"].clone(),
                        "status": c["status"].clone(),
                        "conclusion_date": with_offset(&c["conclusion_date"]),
                        "expiration_date": with_offset(&c["expiration_date"]),
                        "amount": c["amount"].clone(),
                        "payment_frequency": c["payment_frequency"].clone(),
                        "autopayment": {
                            "status": c["autopayment"].clone(),
                            "highlight": c["autopayment"] == "disabled",
                        },
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    json!({
        "id": id,
        "name": request["name"].clone(),
        "email": request["email"].clone(),
        "current_stage": request["stage"].clone(),
        "registration_date": "15.12.2024",
        "last_updated": "2024-12-15T13:30:00.123456+03:00",
        "is_active": request["is_active"].clone(),
        "source": request["source"].clone(),
        "channel": request["channel"].clone(),
        "app": {
            "status": request["app"].clone(),
            "highlight": request["app"] == "installed",
        },
        "last_login": {
            "date": with_offset(&request["last_login"]),
            "highlight": false,
        },
        "contracts": contracts,
    })
}

/// A register/login response body.
pub fn auth_envelope(token: &str, user_id: &str, email: &str, role: &str) -> Value {
    json!({
        "data": {
            "token": token,
            "user": {"id": user_id, "name": "Test User", "email": email, "role": role}
        }
    })
}

/// Re-render a `...Z` timestamp the way the server does, with an explicit offset.
fn with_offset(value: &Value) -> Value {
    match value.as_str().and_then(|s| s.strip_suffix('Z')) {
        Some(base) => Value::String(format!("{}+00:00", base)),
        None => value.clone(),
    }
}
