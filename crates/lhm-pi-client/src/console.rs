use lhm_pi_core::{
	Display, DisplayState, EditValue, Field, FieldEdit, MemoryPanel, Panel, SessionEvent,
	UiEventKind,
};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::{
	io::{AsyncBufReadExt, BufReader},
	sync::mpsc,
};
use tracing::{info, warn};

const USAGE: &str = "commands: set|input|mutate <field> <value>, click showLabel, save, show, quit";

/// Form shared between the session loop and the console reader.
#[derive(Debug, Clone)]
pub struct SharedPanel(Arc<Mutex<MemoryPanel>>);

impl SharedPanel {
	pub fn new(panel: MemoryPanel) -> Self {
		Self(Arc::new(Mutex::new(panel)))
	}

	fn lock(&self) -> MutexGuard<'_, MemoryPanel> {
		self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	pub fn render(&self) -> String {
		let panel = self.lock();
		let mut lines = Vec::new();
		for field in Field::ALL {
			let value = if field.is_checkbox() {
				panel.checked(field).map(|checked| checked.to_string())
			} else {
				panel.value(field)
			};
			lines.push(format!("{field}: {}", value.unwrap_or_else(|| "-".to_string())));
		}
		for display in [Display::CurrentRate, Display::ConnectionStatus] {
			let text = match panel.display(display) {
				Some(DisplayState { text, tint: Some(tint) }) => format!("{text} ({tint})"),
				Some(DisplayState { text, tint: None }) => text.clone(),
				None => "-".to_string(),
			};
			lines.push(format!("{}: {text}", display.as_str()));
		}
		lines.join("\n")
	}
}

impl Panel for SharedPanel {
	fn value(&self, field: Field) -> Option<String> {
		self.lock().value(field)
	}

	fn set_value(&mut self, field: Field, value: &str) {
		self.lock().set_value(field, value);
	}

	fn checked(&self, field: Field) -> Option<bool> {
		self.lock().checked(field)
	}

	fn set_checked(&mut self, field: Field, checked: bool) {
		self.lock().set_checked(field, checked);
	}

	fn set_text(&mut self, target: Display, text: &str) {
		info!(field = target.as_str(), text, "display_updated");
		self.lock().set_text(target, text);
	}

	fn set_tint(&mut self, target: Display, color: &str) {
		self.lock().set_tint(target, color);
	}
}

#[derive(Debug, Clone)]
pub enum Command {
	Session(SessionEvent),
	Show,
	Quit,
}

fn parse_kind(verb: &str) -> Option<Option<UiEventKind>> {
	match verb {
		"set" => Some(Some(UiEventKind::Change)),
		"input" => Some(Some(UiEventKind::Input)),
		"mutate" => Some(None),
		_ => None,
	}
}

fn edit_value(field: Field, raw: &str) -> Result<EditValue, String> {
	if !field.is_checkbox() {
		return Ok(EditValue::Text(raw.to_string()));
	}
	match raw {
		"true" | "on" | "1" => Ok(EditValue::Checked(true)),
		"false" | "off" | "0" => Ok(EditValue::Checked(false)),
		other => Err(format!("showLabel expects true or false, got {other}")),
	}
}

/// Parses one console line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
	let mut parts = line.trim().splitn(3, char::is_whitespace);
	let Some(verb) = parts.next().filter(|verb| !verb.is_empty()) else {
		return Ok(None);
	};
	match verb {
		"save" => Ok(Some(Command::Session(SessionEvent::ForceSave))),
		"show" => Ok(Some(Command::Show)),
		"quit" | "exit" => Ok(Some(Command::Quit)),
		"click" => {
			let field: Field = parts.next().unwrap_or_default().parse()?;
			if !field.is_checkbox() {
				return Err(format!("{field} is not clickable"));
			}
			Ok(Some(Command::Session(SessionEvent::Edit(vec![FieldEdit {
				field,
				value: EditValue::Toggle,
				event: Some(UiEventKind::Click),
			}]))))
		}
		other => {
			let event = parse_kind(other).ok_or_else(|| format!("unknown command: {other}"))?;
			let field: Field = parts.next().unwrap_or_default().parse()?;
			let raw = parts.next().map(str::trim).unwrap_or_default();
			if raw.is_empty() {
				return Err(format!("{other} {field} needs a value"));
			}
			Ok(Some(Command::Session(SessionEvent::Edit(vec![FieldEdit {
				field,
				value: edit_value(field, raw)?,
				event,
			}]))))
		}
	}
}

/// Reads commands from stdin until EOF or `quit`.
pub async fn read_commands(panel: SharedPanel, events: mpsc::UnboundedSender<SessionEvent>) {
	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	loop {
		let line = match lines.next_line().await {
			Ok(Some(line)) => line,
			Ok(None) => break,
			Err(err) => {
				warn!("console_read_error: {err}");
				break;
			}
		};
		match parse_command(&line) {
			Ok(Some(Command::Session(event))) => {
				if events.send(event).is_err() {
					break;
				}
			}
			Ok(Some(Command::Show)) => println!("{}", panel.render()),
			Ok(Some(Command::Quit)) => {
				let _ = events.send(SessionEvent::Closed);
				break;
			}
			Ok(None) => {}
			Err(err) => eprintln!("{err}\n{USAGE}"),
		}
	}
}
