use serde_json::{json, Value};

/// Success envelope echoing the request id.
pub fn ok(id: &str, result: Value) -> Value {
    json!({ "id": id, "ok": true, "result": result })
}

/// Failure envelope. `details` is omitted from the wire when absent.
pub fn err(id: &str, code: &str, message: impl Into<String>, details: Option<Value>) -> Value {
    let mut resp = bare_err(code, message, details);
    resp["id"] = json!(id);
    resp
}

fn bare_err(code: &str, message: impl Into<String>, details: Option<Value>) -> Value {
    let mut error = json!({ "code": code, "message": message.into() });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({ "ok": false, "error": error })
}

/// Reply for a line that never parsed into a request, so there is no id to echo.
pub fn bad_json(message: impl Into<String>) -> Value {
    bare_err("bad_json", message, None)
}
