//! Settings-sync client for the LHM settings tile's property inspector.
//!
//! The crate keeps a form ([`Panel`]) and the tile controller agreeing on the tile's
//! poll interval and appearance over one message channel. [`Session`] owns the channel
//! state machine; everything else is pure normalization and wire shaping.

pub mod appearance;
pub mod binder;
pub mod context;
pub mod normalize;
pub mod panel;
pub mod poller;
pub mod protocol;
pub mod session;
pub mod sink;

pub use appearance::{apply_appearance, signature_of, AppearanceSettings, Signature};
pub use binder::{BinderAction, DeferredSave, UiBinder};
pub use context::{
    resolve_action, resolve_context, AddressingPolicy, ConnectionParams, QueryParams,
    SessionContext, DEFAULT_ACTION, DEFAULT_REGISTER_EVENT,
};
pub use normalize::{
    normalize_color, normalize_flag, normalize_interval, parse_object_or_empty,
    read_current_appearance, snap_interval, Color, ParseOutcome, PollInterval,
    ALLOWED_INTERVALS_MS,
};
pub use panel::{
    Display, DisplayState, EditValue, Field, FieldEdit, MemoryPanel, Panel, UiEvent, UiEventKind,
};
pub use poller::{needs_reconcile, ReconciliationPoller, RECONCILE_CADENCE};
pub use protocol::{classify_inbound, InboundEvent, OutboundMessage, PluginPayload};
pub use session::{run_session, ChannelState, SaveReason, Session, SessionEvent};
pub use sink::{MessageSink, RecordingSink, SendError};
