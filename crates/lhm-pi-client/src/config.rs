use clap::Parser;
use lhm_pi_core::{AddressingPolicy, ConnectionParams, DEFAULT_REGISTER_EVENT};
use std::env;
use thiserror::Error;

/// Host flag spellings and the long options they map to.
const HOST_FLAGS: [(&str, &str); 5] = [
	("-port", "--port"),
	("-pluginUUID", "--plugin-uuid"),
	("-registerEvent", "--register-event"),
	("-info", "--info"),
	("-actionInfo", "--action-info"),
];

#[derive(Parser, Debug)]
#[command(name = "lhm-pi-client")]
pub struct Args {
	#[arg(long, default_value = "")]
	pub port: String,
	#[arg(long, default_value = "")]
	pub plugin_uuid: String,
	#[arg(long, default_value = "")]
	pub register_event: String,
	#[arg(long, default_value = "")]
	pub info: String,
	#[arg(long, default_value = "")]
	pub action_info: String,
	#[arg(long, default_value = "")]
	pub query: String,
	#[arg(long, default_value = "localhost")]
	pub host: String,
	#[arg(long, default_value = "")]
	pub log_dir: String,
	/// Address panel-local messages with the registration id instead of the resolved context.
	#[arg(long)]
	pub address_with_registration_id: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
	#[error("missing port (pass -port or set LHM_PI_PORT)")]
	MissingPort,
	#[error("invalid port: {0}")]
	InvalidPort(String),
	#[error("missing registration id (pass -pluginUUID or set LHM_PI_UUID)")]
	MissingRegistrationId,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
	pub params: ConnectionParams,
	pub host: String,
	pub policy: AddressingPolicy,
	pub log_dir: String,
	pub log_stderr: bool,
}

impl RuntimeConfig {
	pub fn endpoint(&self) -> String {
		format!("ws://{}:{}", self.host, self.params.port)
	}
}

/// Rewrites the host's single-dash flags so clap can parse them.
pub fn normalize_host_args<I>(args: I) -> Vec<String>
where
	I: IntoIterator<Item = String>,
{
	args.into_iter()
		.map(|arg| {
			HOST_FLAGS
				.iter()
				.find(|(host, _)| *host == arg)
				.map(|(_, long)| long.to_string())
				.unwrap_or(arg)
		})
		.collect()
}

pub fn load_config(args: Args) -> Result<RuntimeConfig, ConfigError> {
	let port = resolve_port(&args.port)?;
	let registration_id = resolve_registration_id(&args.plugin_uuid)?;
	let register_event = resolve_register_event(&args.register_event);
	let query = resolve_query(&args.query);
	let policy = if args.address_with_registration_id {
		AddressingPolicy::RegistrationId
	} else {
		AddressingPolicy::ResolvedContext
	};
	Ok(RuntimeConfig {
		params: ConnectionParams::from_raw(
			port,
			&registration_id,
			&register_event,
			&args.info,
			&args.action_info,
			&query,
		),
		host: args.host,
		policy,
		log_dir: resolve_log_dir(&args.log_dir),
		log_stderr: resolve_log_stderr(),
	})
}

fn resolve_value(flag: &str, key: &str) -> Option<String> {
	if !flag.trim().is_empty() {
		return Some(flag.trim().to_string());
	}
	if let Ok(value) = env::var(key) {
		if !value.trim().is_empty() {
			return Some(value.trim().to_string());
		}
	}
	None
}

fn resolve_port(flag: &str) -> Result<u16, ConfigError> {
	match resolve_value(flag, "LHM_PI_PORT") {
		Some(value) => parse_port(&value),
		None => Err(ConfigError::MissingPort),
	}
}

pub fn parse_port(value: &str) -> Result<u16, ConfigError> {
	match value.trim().parse::<u16>() {
		Ok(0) | Err(_) => Err(ConfigError::InvalidPort(value.to_string())),
		Ok(port) => Ok(port),
	}
}

fn resolve_registration_id(flag: &str) -> Result<String, ConfigError> {
	resolve_value(flag, "LHM_PI_UUID").ok_or(ConfigError::MissingRegistrationId)
}

fn resolve_register_event(flag: &str) -> String {
	resolve_value(flag, "LHM_PI_REGISTER_EVENT")
		.unwrap_or_else(|| DEFAULT_REGISTER_EVENT.to_string())
}

fn resolve_query(flag: &str) -> String {
	resolve_value(flag, "LHM_PI_QUERY").unwrap_or_default()
}

fn resolve_log_dir(flag: &str) -> String {
	resolve_value(flag, "LHM_PI_LOG_DIR").unwrap_or_default()
}

fn resolve_log_stderr() -> bool {
	if let Ok(value) = env::var("LHM_PI_LOG_STDERR") {
		if let Some(parsed) = parse_bool_env(&value) {
			return parsed;
		}
	}
	false
}

pub fn parse_bool_env(value: &str) -> Option<bool> {
	match value.trim() {
		"1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON" => Some(true),
		"0" | "false" | "FALSE" | "no" | "NO" | "off" | "OFF" => Some(false),
		_ => None,
	}
}
