use lhm_pi_core::{
    run_session, AddressingPolicy, ChannelState, ConnectionParams, Display, EditValue, Field,
    FieldEdit, MemoryPanel, Panel, ReconciliationPoller, RecordingSink, SaveReason, Session,
    SessionContext, SessionEvent, UiEvent, UiEventKind, RECONCILE_CADENCE,
};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;

const ACTION_INFO: &str = r#"{"action":"x","context":"ctx-x"}"#;

fn params(action_info: &str) -> ConnectionParams {
    ConnectionParams::from_raw(
        28196,
        "uuid-x",
        "registerPropertyInspector",
        r#"{"application":{"version":"6.4.0"}}"#,
        action_info,
        "",
    )
}

fn new_session(
    policy: AddressingPolicy,
) -> (
    Session<RecordingSink>,
    mpsc::UnboundedReceiver<SessionEvent>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let session = Session::new(params(ACTION_INFO), policy, RecordingSink::new(), tx);
    (session, rx)
}

fn opened(
    policy: AddressingPolicy,
) -> (
    Session<RecordingSink>,
    MemoryPanel,
    mpsc::UnboundedReceiver<SessionEvent>,
) {
    let (mut session, rx) = new_session(policy);
    let mut panel = MemoryPanel::new();
    session.start(&panel);
    session.handle(SessionEvent::Opened, &mut panel);
    assert_eq!(session.state(), ChannelState::Open);
    session.sink_mut().clear();
    (session, panel, rx)
}

fn edit(field: Field, text: &str, event: Option<UiEventKind>) -> FieldEdit {
    FieldEdit {
        field,
        value: EditValue::Text(text.to_string()),
        event,
    }
}

fn payload(message: &Value) -> &Value {
    message.get("payload").expect("payload")
}

#[tokio::test(start_paused = true)]
async fn open_sends_handshake_in_order() {
    let (mut session, _rx) = new_session(AddressingPolicy::default());
    assert_eq!(session.context(), Some(&SessionContext::new("ctx-x")));
    assert_eq!(session.action(), "x");
    assert_eq!(session.params().port, 28196);
    let mut panel = MemoryPanel::new();
    session.start(&panel);
    assert_eq!(session.state(), ChannelState::Connecting);
    assert!(session.is_bound());

    session.handle(SessionEvent::Opened, &mut panel);
    let messages = session.sink().messages();
    assert_eq!(
        messages,
        vec![
            json!({"event": "registerPropertyInspector", "uuid": "uuid-x"}),
            json!({"event": "getGlobalSettings", "context": "uuid-x"}),
            json!({"event": "getSettings", "context": "ctx-x"}),
            json!({
                "event": "sendToPlugin",
                "action": "x",
                "context": "ctx-x",
                "payload": {"settingsConnected": true}
            }),
        ]
    );
    assert!(session.poller_running());
}

#[tokio::test(start_paused = true)]
async fn registration_id_policy_addresses_panel_messages_by_uuid() {
    let (session, _panel, _rx) = opened(AddressingPolicy::RegistrationId);
    assert_eq!(session.address().as_deref(), Some("uuid-x"));

    let (mut session, _rx) = new_session(AddressingPolicy::RegistrationId);
    let mut panel = MemoryPanel::new();
    session.handle(SessionEvent::Opened, &mut panel);
    let get_settings = session.sink().matching("getSettings", None);
    assert_eq!(get_settings.len(), 1);
    assert_eq!(get_settings[0]["context"], "uuid-x");
}

#[tokio::test(start_paused = true)]
async fn color_input_saves_exactly_once() {
    let (mut session, mut panel, _rx) = opened(AddressingPolicy::default());
    session.handle(
        SessionEvent::Edit(vec![edit(
            Field::TileBackground,
            "#334455",
            Some(UiEventKind::Input),
        )]),
        &mut panel,
    );
    assert!(session.save_pending());
    assert!(session.flush_deferred(&panel));

    let expected = json!({
        "tileBackground": "#334455",
        "tileTextColor": "#ffffff",
        "showLabel": true
    });
    let sink = session.sink();
    assert_eq!(sink.events(), vec!["setSettings", "sendToPlugin"]);
    let set_settings = sink.matching("setSettings", None);
    assert_eq!(set_settings[0]["context"], "ctx-x");
    assert_eq!(payload(&set_settings[0]), &expected);
    let update = sink.matching("sendToPlugin", Some("updateTileAppearance"));
    assert_eq!(update[0]["action"], "x");
    assert_eq!(payload(&update[0])["updateTileAppearance"], expected);

    session.sink_mut().clear();
    assert!(!session.on_poll_tick(&panel));
    assert!(!session.flush_deferred(&panel));
    assert!(session.sink().sent.is_empty());
}

#[tokio::test(start_paused = true)]
async fn inbound_settings_fill_defaults_without_echo() {
    let (mut session, mut panel, _rx) = opened(AddressingPolicy::default());
    panel.set_value(Field::TileTextColor, "#010203");
    session.handle(
        SessionEvent::Message(
            json!({
                "event": "didReceiveSettings",
                "payload": {"settings": {"tileBackground": " #ABCDEF ", "showLabel": false}}
            })
            .to_string(),
        ),
        &mut panel,
    );
    assert_eq!(panel.value(Field::TileBackground).as_deref(), Some("#abcdef"));
    assert_eq!(panel.value(Field::TileTextColor).as_deref(), Some("#ffffff"));
    assert_eq!(panel.checked(Field::ShowLabel), Some(false));
    assert_eq!(
        session.last_signature().map(|sig| sig.as_str()),
        Some("#abcdef|#ffffff|0")
    );

    assert!(!session.on_poll_tick(&panel));
    assert!(session.sink().sent.is_empty());
}

#[tokio::test(start_paused = true)]
async fn inbound_settings_skip_unchanged_fields() {
    let (mut session, mut panel, _rx) = opened(AddressingPolicy::default());
    let writes = panel.field_writes;
    session.handle(
        SessionEvent::Message(
            json!({
                "event": "didReceiveSettings",
                "payload": {"settings": {
                    "tileBackground": "#000000",
                    "tileTextColor": "#ffffff",
                    "showLabel": true
                }}
            })
            .to_string(),
        ),
        &mut panel,
    );
    assert_eq!(panel.field_writes, writes);
}

#[tokio::test(start_paused = true)]
async fn poll_tick_reconciles_silent_change_once() {
    let (mut session, mut panel, _rx) = opened(AddressingPolicy::default());
    session.handle(
        SessionEvent::Edit(vec![edit(Field::TileTextColor, "#123456", None)]),
        &mut panel,
    );
    assert!(!session.save_pending());
    assert!(session.sink().sent.is_empty());

    session.handle(SessionEvent::PollTick, &mut panel);
    let saved = session.sink().matching("setSettings", None);
    assert_eq!(saved.len(), 1);
    assert_eq!(payload(&saved[0])["tileTextColor"], "#123456");

    session.handle(SessionEvent::PollTick, &mut panel);
    assert_eq!(session.sink().matching("setSettings", None).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unparseable_message_is_ignored() {
    let (mut session, mut panel, _rx) = opened(AddressingPolicy::default());
    let before = panel.clone();
    for raw in ["not json", "[1,2]", "", r#"{"event":"keyDown"}"#] {
        session.handle(SessionEvent::Message(raw.to_string()), &mut panel);
    }
    assert_eq!(panel.field_writes, before.field_writes);
    assert_eq!(panel.value(Field::TileBackground), before.value(Field::TileBackground));
    assert_eq!(panel.current_rate, before.current_rate);
    assert!(session.sink().sent.is_empty());
    assert_eq!(session.state(), ChannelState::Open);
}

#[tokio::test(start_paused = true)]
async fn force_bypasses_dedup() {
    let (mut session, panel, _rx) = opened(AddressingPolicy::default());
    assert!(!session.save(SaveReason::Ui, &panel));
    assert!(session.save(SaveReason::Force, &panel));
    assert!(session.save(SaveReason::Force, &panel));
    assert_eq!(session.sink().matching("setSettings", None).len(), 2);
    assert_eq!(
        session
            .sink()
            .matching("sendToPlugin", Some("updateTileAppearance"))
            .len(),
        2
    );
}

#[tokio::test(start_paused = true)]
async fn interval_change_snaps_and_notifies() {
    let (mut session, mut panel, _rx) = opened(AddressingPolicy::default());
    session.handle(
        SessionEvent::Edit(vec![edit(
            Field::PollInterval,
            "750",
            Some(UiEventKind::Change),
        )]),
        &mut panel,
    );
    assert_eq!(panel.value(Field::PollInterval).as_deref(), Some("500"));
    assert_eq!(
        panel.display(Display::CurrentRate).map(|d| d.text.as_str()),
        Some("500ms")
    );

    let sink = session.sink();
    assert_eq!(sink.events(), vec!["setGlobalSettings", "sendToPlugin"]);
    let global = sink.matching("setGlobalSettings", None);
    assert_eq!(
        global[0],
        json!({"event": "setGlobalSettings", "context": "uuid-x", "payload": {"pollInterval": 500}})
    );
    let notify = sink.matching("sendToPlugin", Some("setPollInterval"));
    assert_eq!(notify[0]["context"], "ctx-x");
    assert_eq!(payload(&notify[0])["setPollInterval"], 500);
    assert!(!session.save_pending());
}

#[tokio::test(start_paused = true)]
async fn interval_input_events_do_nothing() {
    let (mut session, mut panel, _rx) = opened(AddressingPolicy::default());
    session.handle(
        SessionEvent::Edit(vec![edit(
            Field::PollInterval,
            "2000",
            Some(UiEventKind::Input),
        )]),
        &mut panel,
    );
    assert!(session.sink().sent.is_empty());
    assert!(!session.save_pending());
}

#[tokio::test(start_paused = true)]
async fn global_settings_update_interval_and_rate() {
    let (mut session, mut panel, _rx) = opened(AddressingPolicy::default());
    session.handle(
        SessionEvent::Message(
            r#"{"event":"didReceiveGlobalSettings","payload":{"settings":{"pollInterval":"2100"}}}"#
                .to_string(),
        ),
        &mut panel,
    );
    assert_eq!(panel.value(Field::PollInterval).as_deref(), Some("2000"));
    assert_eq!(
        panel.display(Display::CurrentRate).map(|d| d.text.as_str()),
        Some("2000ms")
    );

    session.handle(
        SessionEvent::Message(
            r#"{"event":"didReceiveGlobalSettings","payload":{"settings":{"pollInterval":0}}}"#
                .to_string(),
        ),
        &mut panel,
    );
    assert_eq!(panel.value(Field::PollInterval).as_deref(), Some("1000"));
    assert!(session.sink().sent.is_empty());
}

#[tokio::test(start_paused = true)]
async fn status_messages_set_text_and_tint() {
    let (mut session, mut panel, _rx) = opened(AddressingPolicy::default());
    session.handle(
        SessionEvent::Message(
            json!({
                "event": "sendToPropertyInspector",
                "payload": {"connectionStatus": "Connected", "currentRate": 750}
            })
            .to_string(),
        ),
        &mut panel,
    );
    let status = panel.display(Display::ConnectionStatus).cloned().expect("status");
    assert_eq!(status.text, "Connected");
    assert_eq!(status.tint.as_deref(), Some("#4a4"));
    assert_eq!(
        panel.display(Display::CurrentRate).map(|d| d.text.as_str()),
        Some("750ms")
    );

    session.handle(
        SessionEvent::Message(
            r#"{"event":"sendToPropertyInspector","payload":{"connectionStatus":"Disconnected"}}"#
                .to_string(),
        ),
        &mut panel,
    );
    let status = panel.display(Display::ConnectionStatus).cloned().expect("status");
    assert_eq!(status.text, "Disconnected");
    assert_eq!(status.tint.as_deref(), Some("#a44"));

    session.handle(
        SessionEvent::Message(
            json!({"event": "sendToPropertyInspector", "payload": {"connectionStatus": null}})
                .to_string(),
        ),
        &mut panel,
    );
    let status = panel.display(Display::ConnectionStatus).cloned().expect("status");
    assert_eq!(status.text, "");
    assert_eq!(status.tint.as_deref(), Some("#a44"));
    assert_eq!(
        panel.display(Display::CurrentRate).map(|d| d.text.as_str()),
        Some("750ms")
    );
}

#[tokio::test(start_paused = true)]
async fn close_stops_poller_and_sends() {
    let (mut session, mut panel, _rx) = opened(AddressingPolicy::default());
    assert!(session.poller_running());
    session.handle(SessionEvent::Closed, &mut panel);
    assert_eq!(session.state(), ChannelState::Closed);
    assert!(!session.poller_running());

    panel.set_value(Field::TileBackground, "#999999");
    assert!(!session.save(SaveReason::Force, &panel));
    assert!(!session.on_poll_tick(&panel));
    session.handle(SessionEvent::Opened, &mut panel);
    assert_eq!(session.state(), ChannelState::Closed);
    assert!(session.sink().sent.is_empty());
}

#[tokio::test(start_paused = true)]
async fn transport_failure_while_connecting_closes_quietly() {
    let (mut session, _rx) = new_session(AddressingPolicy::default());
    let mut panel = MemoryPanel::new();
    session.start(&panel);
    session.handle(
        SessionEvent::TransportFailed("connection refused".to_string()),
        &mut panel,
    );
    assert_eq!(session.state(), ChannelState::Closed);
    assert!(!session.poller_running());
    assert!(session.sink().sent.is_empty());
}

#[tokio::test(start_paused = true)]
async fn events_before_render_are_dropped_until_panel_ready() {
    let (mut session, _rx) = new_session(AddressingPolicy::default());
    let mut panel = MemoryPanel::unrendered();
    session.start(&panel);
    session.handle(SessionEvent::Opened, &mut panel);
    assert!(!session.is_bound());
    session.sink_mut().clear();

    session.handle(
        SessionEvent::Ui(UiEvent::new(Field::ShowLabel, UiEventKind::Click)),
        &mut panel,
    );
    assert!(!session.save_pending());

    let mut panel = MemoryPanel::new();
    session.handle(SessionEvent::PanelReady, &mut panel);
    assert!(session.is_bound());
    session.handle(
        SessionEvent::Edit(vec![FieldEdit {
            field: Field::ShowLabel,
            value: EditValue::Toggle,
            event: Some(UiEventKind::Click),
        }]),
        &mut panel,
    );
    assert!(session.flush_deferred(&panel));
    let saved = session.sink().matching("setSettings", None);
    assert_eq!(payload(&saved[0])["showLabel"], false);
}

#[tokio::test(start_paused = true)]
async fn failed_sends_do_not_break_the_session() {
    let (mut session, _rx) = new_session(AddressingPolicy::default());
    session.sink_mut().fail_sends = true;
    let mut panel = MemoryPanel::new();
    session.handle(SessionEvent::Opened, &mut panel);
    assert_eq!(session.state(), ChannelState::Open);
    assert!(session.sink().sent.is_empty());
}

#[tokio::test(start_paused = true)]
async fn run_session_coalesces_one_turn_into_one_save() {
    let (feed, mut events) = mpsc::unbounded_channel();
    let mut session = Session::new(
        params(ACTION_INFO),
        AddressingPolicy::default(),
        RecordingSink::new(),
        feed.clone(),
    );
    let mut panel = MemoryPanel::new();
    session.start(&panel);

    feed.send(SessionEvent::Opened).expect("queue");
    feed.send(SessionEvent::Edit(vec![
        edit(Field::TileBackground, "#111111", Some(UiEventKind::Input)),
        edit(Field::TileBackground, "#222222", Some(UiEventKind::Input)),
        edit(Field::TileTextColor, "#333333", Some(UiEventKind::Change)),
    ]))
    .expect("queue");
    feed.send(SessionEvent::Closed).expect("queue");

    run_session(&mut session, &mut panel, &mut events).await;
    assert_eq!(session.state(), ChannelState::Closed);
    let saved = session.sink().matching("setSettings", None);
    assert_eq!(saved.len(), 1);
    assert_eq!(
        payload(&saved[0]),
        &json!({"tileBackground": "#222222", "tileTextColor": "#333333", "showLabel": true})
    );
}

#[tokio::test(start_paused = true)]
async fn poller_reconciles_through_the_event_queue() {
    let (tx, mut events) = mpsc::unbounded_channel();
    let mut session = Session::new(
        params(ACTION_INFO),
        AddressingPolicy::default(),
        RecordingSink::new(),
        tx.clone(),
    );
    let mut panel = MemoryPanel::new();
    session.start(&panel);

    tx.send(SessionEvent::Opened).expect("queue");
    tx.send(SessionEvent::Edit(vec![edit(Field::TileBackground, "#0a0b0c", None)]))
        .expect("queue");
    let closer = tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(RECONCILE_CADENCE + Duration::from_millis(100)).await;
        let _ = closer.send(SessionEvent::Closed);
    });
    drop(tx);

    run_session(&mut session, &mut panel, &mut events).await;
    let saved = session.sink().matching("setSettings", None);
    assert_eq!(saved.len(), 1);
    assert_eq!(payload(&saved[0])["tileBackground"], "#0a0b0c");
    assert!(!session.poller_running());
}

#[tokio::test(start_paused = true)]
async fn ticks_before_binding_send_nothing() {
    let (mut session, _rx) = new_session(AddressingPolicy::default());
    let mut panel = MemoryPanel::unrendered();
    session.start(&panel);
    session.handle(SessionEvent::Opened, &mut panel);
    session.sink_mut().clear();

    session.handle(SessionEvent::PollTick, &mut panel);
    assert!(session.sink().sent.is_empty());
    assert!(session.last_signature().is_none());

    let mut panel = MemoryPanel::new();
    session.handle(SessionEvent::PollTick, &mut panel);
    assert!(session.sink().sent.is_empty());
    session.handle(SessionEvent::PanelReady, &mut panel);
    session.handle(SessionEvent::PollTick, &mut panel);
    assert!(session.sink().sent.is_empty());
}

#[tokio::test(start_paused = true)]
async fn custom_poller_cadence_drives_reconcile() {
    let cadence = Duration::from_millis(50);
    let (tx, mut events) = mpsc::unbounded_channel();
    let mut session = Session::new(
        params(ACTION_INFO),
        AddressingPolicy::default(),
        RecordingSink::new(),
        tx.clone(),
    )
    .with_poller(ReconciliationPoller::new(cadence));
    let mut panel = MemoryPanel::new();
    session.start(&panel);

    tx.send(SessionEvent::Opened).expect("queue");
    tx.send(SessionEvent::Edit(vec![FieldEdit {
        field: Field::ShowLabel,
        value: EditValue::Checked(false),
        event: None,
    }]))
    .expect("queue");
    let closer = tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(cadence + Duration::from_millis(20)).await;
        let _ = closer.send(SessionEvent::Closed);
    });
    drop(tx);

    run_session(&mut session, &mut panel, &mut events).await;
    let saved = session.sink().matching("setSettings", None);
    assert_eq!(saved.len(), 1);
    assert_eq!(payload(&saved[0])["showLabel"], false);
}
