use std::{
	env,
	fs::{File, OpenOptions},
	io::{self, Write},
	path::PathBuf,
	sync::{Arc, Mutex},
};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, EnvFilter};

pub struct LogGuard {
	file: Option<Arc<Mutex<File>>>,
}

struct MultiWriter {
	stderr_enabled: bool,
	file: Option<Arc<Mutex<File>>>,
}

/// Installs the global subscriber. Filter comes from `RUST_LOG`, then `LHM_PI_LOG_LEVEL`,
/// then `info`.
pub fn init_logging(
	log_dir: &str,
	registration_id: &str,
	stderr_enabled: bool,
) -> Option<LogGuard> {
	let level = env::var("LHM_PI_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
	let guard = match open_log_file(log_dir, registration_id) {
		Ok(guard) => guard,
		Err(err) => {
			eprintln!("log_file_error: {err}");
			LogGuard { file: None }
		}
	};
	let file = guard.file.clone();
	let make_writer = BoxMakeWriter::new(move || MultiWriter::new(file.clone(), stderr_enabled));
	let subscriber = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(make_writer)
		.with_ansi(false)
		.finish();
	if tracing::subscriber::set_global_default(subscriber).is_err() {
		return None;
	}
	Some(guard)
}

impl MultiWriter {
	fn new(file: Option<Arc<Mutex<File>>>, stderr_enabled: bool) -> Self {
		Self {
			stderr_enabled,
			file,
		}
	}
}

impl Write for MultiWriter {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		if self.stderr_enabled {
			let _ = io::stderr().write_all(buf);
		}
		if let Some(file) = &self.file {
			if let Ok(mut file) = file.lock() {
				let _ = file.write_all(buf);
			}
		}
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		if self.stderr_enabled {
			let _ = io::stderr().flush();
		}
		if let Some(file) = &self.file {
			if let Ok(mut file) = file.lock() {
				let _ = file.flush();
			}
		}
		Ok(())
	}
}

pub fn log_file_path(log_dir: &str, registration_id: &str) -> PathBuf {
	PathBuf::from(log_dir).join(format!("lhm-pi-{}.log", sanitize_component(registration_id)))
}

fn open_log_file(log_dir: &str, registration_id: &str) -> io::Result<LogGuard> {
	if log_dir.trim().is_empty() {
		return Ok(LogGuard { file: None });
	}
	std::fs::create_dir_all(log_dir)?;
	let file = OpenOptions::new()
		.create(true)
		.append(true)
		.open(log_file_path(log_dir, registration_id))?;
	Ok(LogGuard {
		file: Some(Arc::new(Mutex::new(file))),
	})
}

fn sanitize_component(input: &str) -> String {
	input
		.chars()
		.map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
		.collect()
}
