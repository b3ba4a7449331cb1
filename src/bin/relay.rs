//! tempmail-relay - pipe command forwarding one message to the backend.
//!
//! Usage: `tempmail-relay [config.toml] < message.eml`

use std::io::IsTerminal;
use std::process::ExitCode;

use tempmail::config::Config;
use tempmail::logging;
use tempmail::relay::{self, RelayExit};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    // The relay usually runs without a config file, from the environment alone.
    let (mut config, load_error) = match Config::load_optional(&config_path) {
        Ok(Some(config)) => (config, None),
        Ok(None) => (Config::default(), None),
        Err(e) => (Config::default(), Some(e)),
    };
    config.apply_env_overrides();

    logging::init_stderr(&config.relay.log_level);
    match load_error {
        Some(e) => tracing::warn!(
            path = %config_path,
            error = %e,
            "Could not load relay configuration, using defaults"
        ),
        None => tracing::debug!(path = %config_path, "Relay configuration loaded"),
    }

    // A misconfigured relay leaves the message queued until it is fixed.
    if let Err(e) = config.relay.validate_backend_url() {
        tracing::error!(error = %e, "Invalid relay configuration");
        return ExitCode::from(RelayExit::TempFail.code());
    }

    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        tracing::error!("tempmail-relay must be run as a pipe, not interactively");
        return ExitCode::from(RelayExit::DataErr.code());
    }

    let exit = relay::run(&config.relay, stdin.lock()).await;
    ExitCode::from(exit.code())
}
