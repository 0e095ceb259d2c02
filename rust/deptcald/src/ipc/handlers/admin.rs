use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{bad_params, Reply};
use crate::ipc::types::{AdminSession, AppState, Request};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

fn handle_login(state: &mut AppState, req: &Request) -> Reply {
    let username = req
        .params
        .get("username")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .unwrap_or("");
    let password = req
        .params
        .get("password")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if username.is_empty() || password.is_empty() {
        return Err(bad_params(req, "please enter both username and password"));
    }

    if !state.config.check_admin(username, password) {
        warn!(username, "admin login rejected");
        return Err(err(&req.id, "unauthorized", "invalid username or password", None));
    }

    let session = AdminSession {
        token: Uuid::new_v4().to_string(),
        username: username.to_string(),
        started_at: chrono::Utc::now().to_rfc3339(),
    };
    info!(username, "admin session started");
    let result = json!({
        "token": session.token,
        "username": session.username,
        "startedAt": session.started_at
    });
    state.admin = Some(session);
    Ok(ok(&req.id, result))
}

fn handle_logout(state: &mut AppState, req: &Request) -> Reply {
    let was_active = state.admin.take().is_some();
    if was_active {
        info!("admin session ended");
    }
    Ok(ok(&req.id, json!({ "ok": true, "wasActive": was_active })))
}

fn handle_session(state: &mut AppState, req: &Request) -> Reply {
    let result = match &state.admin {
        Some(s) => json!({
            "active": true,
            "username": s.username,
            "startedAt": s.started_at
        }),
        None => json!({ "active": false }),
    };
    Ok(ok(&req.id, result))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "admin.login" => handle_login(state, req),
        "admin.logout" => handle_logout(state, req),
        "admin.session" => handle_session(state, req),
        _ => return None,
    };
    Some(res.unwrap_or_else(|e| e))
}
