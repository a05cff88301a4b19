use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::appearance::{apply_appearance, signature_of, Signature};
use crate::binder::{BinderAction, DeferredSave, UiBinder};
use crate::context::{AddressingPolicy, ConnectionParams, SessionContext};
use crate::normalize::{normalize_interval, read_current_appearance};
use crate::panel::{Display, Field, FieldEdit, Panel, UiEvent};
use crate::poller::{needs_reconcile, ReconciliationPoller};
use crate::protocol::{
    classify_inbound, InboundEvent, OutboundMessage, PluginPayload, CONNECTED_STATUS,
    STATUS_ERROR_TINT, STATUS_OK_TINT,
};
use crate::sink::{MessageSink, SendError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Open,
    Closed,
}

impl ChannelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelState::Disconnected => "disconnected",
            ChannelState::Connecting => "connecting",
            ChannelState::Open => "open",
            ChannelState::Closed => "closed",
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveReason {
    Ui,
    Reconcile,
    Force,
}

impl SaveReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaveReason::Ui => "ui",
            SaveReason::Reconcile => "poll",
            SaveReason::Force => "force",
        }
    }
}

/// Everything the session reacts to. Delivered one at a time by [`run_session`].
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Opened,
    Message(String),
    Closed,
    TransportFailed(String),
    PollTick,
    Ui(UiEvent),
    Edit(Vec<FieldEdit>),
    PanelReady,
    ForceSave,
}

/// One connection's worth of panel state. Built at connection start, dropped at close.
pub struct Session<S> {
    params: ConnectionParams,
    action: String,
    context: Option<SessionContext>,
    policy: AddressingPolicy,
    state: ChannelState,
    last_signature: Option<Signature>,
    binder: UiBinder,
    deferred: DeferredSave,
    poller: ReconciliationPoller,
    events: mpsc::UnboundedSender<SessionEvent>,
    sink: S,
}

impl<S: MessageSink> Session<S> {
    pub fn new(
        params: ConnectionParams,
        policy: AddressingPolicy,
        sink: S,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let context = params.resolve_context();
        let action = params.resolve_action();
        debug!(
            context = context.as_ref().map(SessionContext::as_str).unwrap_or(""),
            action = %action,
            "session_context_resolved"
        );
        Self {
            params,
            action,
            context,
            policy,
            state: ChannelState::Disconnected,
            last_signature: None,
            binder: UiBinder::new(),
            deferred: DeferredSave::default(),
            poller: ReconciliationPoller::default(),
            events,
            sink,
        }
    }

    pub fn with_poller(mut self, poller: ReconciliationPoller) -> Self {
        self.poller = poller;
        self
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn context(&self) -> Option<&SessionContext> {
        self.context.as_ref()
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    pub fn last_signature(&self) -> Option<&Signature> {
        self.last_signature.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.binder.is_bound()
    }

    pub fn poller_running(&self) -> bool {
        self.poller.is_running()
    }

    pub fn save_pending(&self) -> bool {
        self.deferred.is_pending()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Context carried by panel-local messages under the current policy.
    pub fn address(&self) -> Option<String> {
        match self.policy {
            AddressingPolicy::ResolvedContext => {
                self.context.as_ref().map(|ctx| ctx.as_str().to_string())
            }
            AddressingPolicy::RegistrationId => {
                let registration_id = self.params.registration_id.trim();
                if registration_id.is_empty() {
                    self.context.as_ref().map(|ctx| ctx.as_str().to_string())
                } else {
                    Some(registration_id.to_string())
                }
            }
        }
    }

    fn send(&mut self, message: OutboundMessage) -> bool {
        if self.state != ChannelState::Open {
            return false;
        }
        let result = message
            .to_json()
            .map_err(|err| SendError::Encode(err.to_string()))
            .and_then(|text| self.sink.send_text(text));
        match result {
            Ok(()) => true,
            Err(err) => {
                warn!(event = %message.event, "send_failed: {err}");
                false
            }
        }
    }

    /// `Disconnected → Connecting`. Binds the form if it is already rendered.
    pub fn start<P: Panel + ?Sized>(&mut self, panel: &P) {
        if self.state != ChannelState::Disconnected {
            debug!(state = %self.state, "start_ignored");
            return;
        }
        self.state = ChannelState::Connecting;
        info!(port = self.params.port, "session_connecting");
        self.bind_ui(panel);
    }

    /// Binds field listeners once and records the form's appearance as the saved baseline.
    pub fn bind_ui<P: Panel + ?Sized>(&mut self, panel: &P) -> bool {
        if !self.binder.bind(panel) {
            return false;
        }
        self.last_signature = Some(signature_of(&read_current_appearance(panel)));
        debug!("ui_bound");
        true
    }

    pub fn on_open<P: Panel + ?Sized>(&mut self, panel: &P) {
        match self.state {
            ChannelState::Disconnected | ChannelState::Connecting => {}
            other => {
                debug!(state = %other, "open_ignored");
                return;
            }
        }
        self.bind_ui(panel);
        self.state = ChannelState::Open;
        info!(
            host_version = self.params.host_version().unwrap_or("unknown"),
            "session_open"
        );

        let registration_id = self.params.registration_id.clone();
        let register_event = self.params.register_event.clone();
        self.send(OutboundMessage::register(&register_event, &registration_id));
        self.send(OutboundMessage::get_global_settings(&registration_id));
        if let Some(address) = self.address() {
            self.send(OutboundMessage::get_settings(&address));
            let action = self.action.clone();
            self.send(OutboundMessage::send_to_plugin(
                &action,
                &address,
                &PluginPayload::SettingsConnected(true),
            ));
        }
        self.poller.restart(self.events.clone());
    }

    pub fn on_message<P: Panel + ?Sized>(&mut self, raw: &str, panel: &mut P) {
        match classify_inbound(raw) {
            InboundEvent::GlobalSettings { poll_interval } => {
                panel.set_value(Field::PollInterval, &poll_interval.to_string());
                panel.set_text(Display::CurrentRate, &poll_interval.rate_label());
                debug!(poll_interval = poll_interval.millis(), "global_settings_applied");
            }
            InboundEvent::PanelSettings { settings } => {
                if let Some(signature) = apply_appearance(panel, &settings) {
                    debug!(signature = %signature, "panel_settings_applied");
                    self.last_signature = Some(signature);
                }
            }
            InboundEvent::Status {
                connection_status,
                current_rate,
            } => {
                if let Some(status) = connection_status {
                    let tint = if status == CONNECTED_STATUS {
                        STATUS_OK_TINT
                    } else {
                        STATUS_ERROR_TINT
                    };
                    panel.set_text(Display::ConnectionStatus, &status);
                    panel.set_tint(Display::ConnectionStatus, tint);
                }
                if let Some(rate) = current_rate {
                    panel.set_text(Display::CurrentRate, &format!("{rate}ms"));
                }
            }
            InboundEvent::Ignored { event } => {
                debug!(event = event.as_deref().unwrap_or(""), "inbound_ignored");
            }
        }
    }

    /// `→ Closed`. Cancels the poller; nothing is sent afterwards.
    pub fn on_close(&mut self) {
        if self.state == ChannelState::Closed {
            return;
        }
        self.state = ChannelState::Closed;
        self.poller.cancel();
        info!("session_closed");
    }

    pub fn on_transport_failed(&mut self, reason: &str) {
        warn!("transport_failed: {reason}");
        self.on_close();
    }

    pub fn on_ui_event<P: Panel + ?Sized>(&mut self, event: UiEvent, panel: &mut P) {
        match self.binder.route(event) {
            Some(BinderAction::IntervalChanged) => {
                self.change_interval(panel);
            }
            Some(BinderAction::ScheduleSave) => self.deferred.schedule(),
            None => {}
        }
    }

    /// Interval field `change`: snap, write back, push to the controller.
    pub fn change_interval<P: Panel + ?Sized>(&mut self, panel: &mut P) -> bool {
        if self.state != ChannelState::Open {
            return false;
        }
        let Some(raw) = panel.value(Field::PollInterval) else {
            return false;
        };
        let interval = normalize_interval(&raw);
        panel.set_value(Field::PollInterval, &interval.to_string());

        let registration_id = self.params.registration_id.clone();
        self.send(OutboundMessage::set_global_settings(&registration_id, interval));
        panel.set_text(Display::CurrentRate, &interval.rate_label());
        if let Some(address) = self.address() {
            let action = self.action.clone();
            self.send(OutboundMessage::send_to_plugin(
                &action,
                &address,
                &PluginPayload::SetPollInterval(interval),
            ));
        }
        info!(poll_interval = interval.millis(), "poll_interval_changed");
        true
    }

    /// Persists the form's appearance and asks the controller to redraw. Returns whether
    /// the pair of messages went out.
    pub fn save<P: Panel + ?Sized>(&mut self, reason: SaveReason, panel: &P) -> bool {
        if self.state != ChannelState::Open {
            return false;
        }
        let Some(address) = self.address() else {
            return false;
        };
        let settings = read_current_appearance(panel);
        let signature = signature_of(&settings);
        if reason != SaveReason::Force && self.last_signature.as_ref() == Some(&signature) {
            debug!(reason = reason.as_str(), "save_skipped_unchanged");
            return false;
        }
        self.last_signature = Some(signature);

        let action = self.action.clone();
        self.send(OutboundMessage::set_settings(&address, &settings));
        self.send(OutboundMessage::send_to_plugin(
            &action,
            &address,
            &PluginPayload::UpdateTileAppearance(settings),
        ));
        debug!(reason = reason.as_str(), context = %address, "appearance_saved");
        true
    }

    /// Saves when the form drifted from the last saved appearance. Does nothing until the
    /// form is bound, so an unrendered form never overwrites stored settings with defaults.
    pub fn on_poll_tick<P: Panel + ?Sized>(&mut self, panel: &P) -> bool {
        if !self.binder.is_bound() {
            return false;
        }
        if !needs_reconcile(panel, self.last_signature.as_ref()) {
            return false;
        }
        self.save(SaveReason::Reconcile, panel)
    }

    /// Runs the save scheduled during the turn that just ended, if any.
    pub fn flush_deferred<P: Panel + ?Sized>(&mut self, panel: &P) -> bool {
        match self.deferred.take() {
            Some(coalesced) => {
                if coalesced > 0 {
                    debug!(coalesced, "deferred_saves_coalesced");
                }
                self.save(SaveReason::Ui, panel)
            }
            None => false,
        }
    }

    pub fn handle<P: Panel + ?Sized>(&mut self, event: SessionEvent, panel: &mut P) {
        match event {
            SessionEvent::Opened => self.on_open(panel),
            SessionEvent::Message(raw) => self.on_message(&raw, panel),
            SessionEvent::Closed => self.on_close(),
            SessionEvent::TransportFailed(reason) => self.on_transport_failed(&reason),
            SessionEvent::PollTick => {
                self.on_poll_tick(panel);
            }
            SessionEvent::Ui(event) => self.on_ui_event(event, panel),
            SessionEvent::Edit(edits) => {
                for edit in edits {
                    edit.apply(&mut *panel);
                    if let Some(event) = edit.ui_event() {
                        self.on_ui_event(event, &mut *panel);
                    }
                }
            }
            SessionEvent::PanelReady => {
                self.bind_ui(panel);
            }
            SessionEvent::ForceSave => {
                self.save(SaveReason::Force, panel);
            }
        }
    }
}

/// Drives the session from its event queue until the channel closes. Each event is one
/// turn; deferred saves run once the turn's handler has returned.
pub async fn run_session<S, P>(
    session: &mut Session<S>,
    panel: &mut P,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
) where
    S: MessageSink,
    P: Panel + ?Sized,
{
    while let Some(event) = events.recv().await {
        session.handle(event, &mut *panel);
        session.flush_deferred(&*panel);
        if session.state() == ChannelState::Closed {
            break;
        }
    }
}
