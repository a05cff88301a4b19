use crate::panel::{Field, Panel, UiEvent, UiEventKind};

/// What a bound UI event asks the session to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinderAction {
    IntervalChanged,
    ScheduleSave,
}

/// Field-level listeners. Binding happens once, and only against a fully rendered form.
#[derive(Debug, Default)]
pub struct UiBinder {
    bound: bool,
}

impl UiBinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Returns true only on the call that performs the binding.
    pub fn bind<P: Panel + ?Sized>(&mut self, panel: &P) -> bool {
        if self.bound || !panel.is_rendered() {
            return false;
        }
        self.bound = true;
        true
    }

    pub fn route(&self, event: UiEvent) -> Option<BinderAction> {
        if !self.bound {
            return None;
        }
        match (event.field, event.kind) {
            (Field::PollInterval, UiEventKind::Change) => Some(BinderAction::IntervalChanged),
            (
                Field::TileBackground | Field::TileTextColor,
                UiEventKind::Change | UiEventKind::Input,
            ) => Some(BinderAction::ScheduleSave),
            (Field::ShowLabel, _) => Some(BinderAction::ScheduleSave),
            _ => None,
        }
    }
}

/// Save requested during the current loop turn, executed once when the turn ends.
#[derive(Debug, Default)]
pub struct DeferredSave {
    pending: bool,
    coalesced: usize,
}

impl DeferredSave {
    pub fn schedule(&mut self) {
        if self.pending {
            self.coalesced += 1;
        }
        self.pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Clears the request. `Some(n)` when one was pending, `n` being the extra schedules
    /// it absorbed.
    pub fn take(&mut self) -> Option<usize> {
        if !self.pending {
            return None;
        }
        self.pending = false;
        Some(std::mem::take(&mut self.coalesced))
    }
}
