//! ## Sets up logging by reading configuration from environment variables.
//!
//! Environment variables used:
//! - LOG_MODE: "stdout" (default) or "file"
//! - LOG_LEVEL: log level ("trace", "debug", "info", "warn", "error"); default is "info"
//! - LOG_DATA_DIR: directory for log files; default is "logs/"
//! - LOG_MAX_SIZE: maximum size of log files in bytes; default is 1GB

pub mod error;

use chrono::Utc;
use std::{
	env,
	fs::{create_dir_all, metadata},
	path::Path,
};
use tracing::{info, Subscriber};
use tracing_subscriber::{
	filter::EnvFilter,
	fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
	prelude::*,
	registry::LookupSpan,
};

const DEFAULT_LOG_MAX_SIZE: u64 = 1_073_741_824;
const LOG_FILE_NAME: &str = "substrate-connect.log";

/// Where log output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
	Stdout,
	File,
}

/// Logging settings resolved from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
	pub mode: LogMode,
	pub level: tracing::Level,
	pub data_dir: String,
	pub max_size: u64,
}

impl LoggingConfig {
	/// Reads the logging settings from the process environment.
	///
	/// Unknown levels fall back to `info`; an unparsable `LOG_MAX_SIZE` is rejected.
	pub fn from_env() -> Result<Self, String> {
		let mode = match env::var("LOG_MODE")
			.unwrap_or_else(|_| "stdout".to_string())
			.to_lowercase()
			.as_str()
		{
			"file" => LogMode::File,
			_ => LogMode::Stdout,
		};

		let level = parse_level(&env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()));
		let data_dir = env::var("LOG_DATA_DIR").unwrap_or_else(|_| "logs/".to_string());
		let max_size = match env::var("LOG_MAX_SIZE") {
			Ok(raw) => raw
				.parse::<u64>()
				.map_err(|_| format!("LOG_MAX_SIZE must be a valid u64 if set, got '{}'", raw))?,
			Err(_) => DEFAULT_LOG_MAX_SIZE,
		};

		Ok(Self {
			mode,
			level,
			data_dir,
			max_size,
		})
	}
}

fn parse_level(raw: &str) -> tracing::Level {
	match raw.to_lowercase().as_str() {
		"trace" => tracing::Level::TRACE,
		"debug" => tracing::Level::DEBUG,
		"warn" => tracing::Level::WARN,
		"error" => tracing::Level::ERROR,
		_ => tracing::Level::INFO,
	}
}

/// Custom formatter that strips ANSI escape codes from log output
struct StripAnsiFormatter<T> {
	inner: T,
	pattern: regex::Regex,
}

impl<T> StripAnsiFormatter<T> {
	fn new(inner: T) -> Result<Self, regex::Error> {
		Ok(Self {
			inner,
			pattern: regex::Regex::new(r"\x1b\[[0-9;]*[a-zA-Z]")?,
		})
	}
}

impl<S, N, T> FormatEvent<S, N> for StripAnsiFormatter<T>
where
	S: Subscriber + for<'a> LookupSpan<'a>,
	N: for<'a> FormatFields<'a> + 'static,
	T: FormatEvent<S, N>,
{
	fn format_event(
		&self,
		ctx: &FmtContext<'_, S, N>,
		mut writer: Writer<'_>,
		event: &tracing::Event<'_>,
	) -> std::fmt::Result {
		let mut buf = String::new();
		self.inner.format_event(ctx, Writer::new(&mut buf), event)?;
		write!(writer, "{}", self.pattern.replace_all(&buf, ""))
	}
}

/// Computes the path of the rolled log file given the base file path and the date string.
pub fn compute_rolled_file_path(base_file_path: &str, date_str: &str, index: u32) -> String {
	let trimmed = base_file_path
		.strip_suffix(".log")
		.unwrap_or(base_file_path);
	format!("{}-{}.{}.log", trimmed, date_str, index)
}

/// Picks the first rolled file for `date_str` that is still below `max_size` bytes.
pub fn space_based_rolling(
	file_path: &str,
	base_file_path: &str,
	date_str: &str,
	max_size: u64,
) -> String {
	let mut final_path = file_path.to_string();
	let mut index = 1;
	while let Ok(metadata) = metadata(&final_path) {
		if metadata.len() > max_size {
			index += 1;
			final_path = compute_rolled_file_path(base_file_path, date_str, index);
		} else {
			break;
		}
	}
	final_path
}

fn create_log_format(with_ansi: bool) -> fmt::format::Format<fmt::format::Compact> {
	fmt::format()
		.with_level(true)
		.with_target(true)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_ansi(with_ansi)
		.compact()
}

/// Sets up logging by reading configuration from environment variables.
pub fn setup_logging() -> Result<(), Box<dyn std::error::Error>> {
	let config = LoggingConfig::from_env()?;
	let subscriber =
		tracing_subscriber::registry().with(EnvFilter::new(config.level.to_string()));

	match config.mode {
		LogMode::File => {
			let log_dir = format!("{}/", config.data_dir.trim_end_matches('/'));
			let date_str = Utc::now().format("%Y-%m-%d").to_string();
			let base_file_path = format!("{}{}", log_dir, LOG_FILE_NAME);
			let time_based_path = compute_rolled_file_path(&base_file_path, &date_str, 1);

			if let Some(parent) = Path::new(&time_based_path).parent() {
				create_dir_all(parent)?;
			}

			let final_path =
				space_based_rolling(&time_based_path, &base_file_path, &date_str, config.max_size);
			let final_path = Path::new(&final_path);
			let file_appender = tracing_appender::rolling::never(
				final_path.parent().unwrap_or(Path::new(".")),
				final_path.file_name().unwrap_or_default(),
			);

			subscriber
				.with(
					fmt::layer()
						.event_format(StripAnsiFormatter::new(create_log_format(false))?)
						.with_writer(file_appender)
						.fmt_fields(fmt::format::PrettyFields::new()),
				)
				.try_init()?;
		}
		LogMode::Stdout => {
			subscriber
				.with(
					fmt::layer()
						.event_format(create_log_format(true))
						.fmt_fields(fmt::format::PrettyFields::new()),
				)
				.try_init()?;
		}
	}

	info!(mode = ?config.mode, level = %config.level, "Logging is configured");
	Ok(())
}
