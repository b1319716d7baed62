//! JSON-RPC envelope helpers shared by the MCP transport layer.

use serde_json::{json, Value};

/// Create a successful JSON-RPC 2.0 response envelope.
pub fn create_success_response(id: Option<Value>, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "result": result,
        "id": id
    })
}

/// Create a JSON-RPC 2.0 response envelope with a null result.
pub fn create_null_response(id: Option<Value>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "result": null,
        "id": id
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_response_carries_result_and_id() {
        let response = create_success_response(Some(json!(1)), json!({"ok": true}));
        assert_eq!(response["jsonrpc"], "2.0");
        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["ok"], true);
    }

    #[test]
    fn null_response_has_null_result() {
        let response = create_null_response(Some(json!("abc")));
        assert!(response["result"].is_null());
        assert_eq!(response["id"], "abc");
    }
}
