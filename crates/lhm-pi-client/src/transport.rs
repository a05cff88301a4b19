use futures_util::{SinkExt, StreamExt};
use lhm_pi_core::SessionEvent;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Connects once, then pumps frames in both directions until either side goes away.
/// Inbound text becomes `SessionEvent::Message`; the session always sees a final
/// `Closed` or `TransportFailed`.
pub async fn run(
	endpoint: String,
	mut outbound: mpsc::UnboundedReceiver<String>,
	events: mpsc::UnboundedSender<SessionEvent>,
) {
	let ws = match connect_async(endpoint.as_str()).await {
		Ok((ws, _)) => ws,
		Err(err) => {
			warn!("transport_connect_error: {err}");
			let _ = events.send(SessionEvent::TransportFailed(err.to_string()));
			return;
		}
	};
	info!(endpoint = %endpoint, "transport_connected");
	let (mut sink, mut stream) = ws.split();
	if events.send(SessionEvent::Opened).is_err() {
		return;
	}

	let writer = tokio::spawn(async move {
		while let Some(text) = outbound.recv().await {
			if let Err(err) = sink.send(Message::Text(text)).await {
				warn!("transport_write_error: {err}");
				break;
			}
		}
		let _ = sink.close().await;
	});

	while let Some(frame) = stream.next().await {
		match frame {
			Ok(Message::Text(text)) => {
				if events.send(SessionEvent::Message(text)).is_err() {
					break;
				}
			}
			Ok(Message::Close(_)) => break,
			Ok(other) => debug!(len = other.len(), "transport_frame_ignored"),
			Err(err) => {
				warn!("transport_read_error: {err}");
				break;
			}
		}
	}
	info!("transport_closed");
	let _ = events.send(SessionEvent::Closed);
	writer.abort();
}
