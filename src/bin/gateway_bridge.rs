//! gateway-bridge：OpenAI 兼容桥接服务启动入口
//!
//! Usage:
//!   gateway-bridge [--config <path>] [--port <port>] [--username <user>]
//!                  [--tool-mode auto|native|prompt] [--dlog] [--no-check]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use gateway_bridge::config::BridgeConfig;
use gateway_bridge::server::{self, AppState};
use gateway_bridge::transport::{check_connections, HttpUpstream};
use gateway_bridge::logging;

#[derive(Debug, Default)]
struct CliArgs {
    config: Option<PathBuf>,
    port: Option<u16>,
    username: Option<String>,
    tool_mode: Option<String>,
    verbose: bool,
    no_check: bool,
}

fn parse_args(args: &[String]) -> anyhow::Result<CliArgs> {
    let mut cli = CliArgs::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => cli.config = Some(PathBuf::from(value_of(&mut iter, arg)?)),
            "--port" => {
                let raw = value_of(&mut iter, arg)?;
                cli.port = Some(raw.parse().with_context(|| format!("invalid port: {raw}"))?);
            }
            "--username" => cli.username = Some(value_of(&mut iter, arg)?.to_string()),
            "--tool-mode" => cli.tool_mode = Some(value_of(&mut iter, arg)?.to_string()),
            "--dlog" => cli.verbose = true,
            "--no-check" => cli.no_check = true,
            "help" | "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "version" | "--version" | "-V" => {
                println!("gateway-bridge {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(cli)
}

fn value_of<'a>(iter: &mut std::slice::Iter<'a, String>, flag: &str) -> anyhow::Result<&'a str> {
    iter.next()
        .map(String::as_str)
        .with_context(|| format!("{flag} requires a value"))
}

fn print_usage() {
    println!(
        r#"gateway-bridge: OpenAI-compatible bridge to the upstream gateway

USAGE:
    gateway-bridge [OPTIONS]

OPTIONS:
    --config <path>       YAML configuration file
    --port <port>         Listen port (default 7285)
    --username <user>     Default upstream user
    --tool-mode <mode>    auto | native | prompt
    --dlog                Debug logging on console and file
    --no-check            Skip the startup connection check

ENVIRONMENT:
    BRIDGE_CONFIG         Configuration file when --config is absent
    BRIDGE_*              Per-field overrides (see README)
    RUST_LOG              Console log filter override"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_args(&args)?;

    let config_path = cli
        .config
        .or_else(|| std::env::var_os("BRIDGE_CONFIG").map(PathBuf::from));
    let mut config = BridgeConfig::load(config_path.as_deref()).context("loading configuration")?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(user) = cli.username {
        config.default_user = user;
    }
    if let Some(mode) = cli.tool_mode {
        config.tool_mode = mode.parse()?;
    }
    if cli.verbose {
        config.logging.verbose = true;
    }
    if cli.no_check {
        config.check_connection = false;
    }

    logging::init(&config.logging)?;
    tracing::info!(
        port = config.port,
        user = %config.default_user,
        tool_mode = ?config.tool_mode,
        "Starting gateway bridge"
    );

    if config.check_connection {
        let total = config.upstream.endpoints().len();
        let reachable = check_connections(&config.upstream).await;
        if reachable < total {
            tracing::warn!("{}/{} upstream endpoints reachable", reachable, total);
        }
    }

    let upstream = Arc::new(HttpUpstream::new(config.upstream.clone())?);
    server::serve(AppState::new(config, upstream)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_flags() {
        let cli = parse_args(&args(&["--port", "9000", "--username", "alice", "--dlog"])).unwrap();
        assert_eq!(cli.port, Some(9000));
        assert_eq!(cli.username.as_deref(), Some("alice"));
        assert!(cli.verbose);
        assert!(!cli.no_check);
    }

    #[test]
    fn test_parse_rejects_missing_value_and_unknown() {
        assert!(parse_args(&args(&["--port"])).is_err());
        assert!(parse_args(&args(&["--port", "abc"])).is_err());
        assert!(parse_args(&args(&["--frobnicate"])).is_err());
    }
}
