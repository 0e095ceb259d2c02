mod calendar;
mod config;
mod db;
mod ipc;
mod register_range;
mod seed;
mod settings;
mod slots;
mod timing;
mod validation;

use anyhow::Context;
use std::io::{self, BufRead, Write};
use tracing::{info, warn};

use config::{Config, SeedMode};

fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_max_level(config.log_level)
        .init();

    let conn = db::open_db().context("failed to open in-memory store")?;
    match config.seed {
        SeedMode::Mock => seed::seed_mock(&conn).context("failed to seed mock data")?,
        SeedMode::Empty => seed::seed_settings(&conn).context("failed to seed settings")?,
    }
    info!(
        version = env!("CARGO_PKG_VERSION"),
        seed = config.seed.as_str(),
        "deptcald ready"
    );

    let mut state = ipc::AppState::new(conn, config);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                warn!("stdin closed: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                warn!("rejecting malformed request: {e}");
                ipc::bad_json(e.to_string())
            }
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    info!("deptcald stopped");
    Ok(())
}
