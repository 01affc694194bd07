use parking_lot::Mutex;

const INTERRUPTED: &str = "処理が中断されました";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SlotState {
    #[default]
    Idle,
    InFlight,
    Errored(String),
}

/// Single-slot guard for one family of network calls.
///
/// A second `try_begin` while a call is outstanding is rejected rather than
/// queued. The returned guard always moves the slot out of `InFlight` when it
/// is dropped.
#[derive(Debug)]
pub struct RequestSlot {
    name: &'static str,
    state: Mutex<SlotState>,
}

impl RequestSlot {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(SlotState::Idle),
        }
    }

    pub fn state(&self) -> SlotState {
        self.state.lock().clone()
    }

    pub fn is_busy(&self) -> bool {
        matches!(*self.state.lock(), SlotState::InFlight)
    }

    pub fn try_begin(&self) -> Option<SlotGuard<'_>> {
        let mut state = self.state.lock();
        if matches!(*state, SlotState::InFlight) {
            tracing::debug!(slot = self.name, "request already in flight; ignoring");
            return None;
        }
        *state = SlotState::InFlight;
        Some(SlotGuard {
            slot: self,
            outcome: None,
        })
    }
}

#[must_use = "dropping the guard immediately ends the request"]
#[derive(Debug)]
pub struct SlotGuard<'a> {
    slot: &'a RequestSlot,
    outcome: Option<SlotState>,
}

impl SlotGuard<'_> {
    pub fn succeed(mut self) {
        self.outcome = Some(SlotState::Idle);
    }

    pub fn fail(mut self, message: impl Into<String>) {
        self.outcome = Some(SlotState::Errored(message.into()));
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        // No explicit outcome means the future was dropped mid-request.
        let next = self
            .outcome
            .take()
            .unwrap_or_else(|| SlotState::Errored(INTERRUPTED.to_string()));
        *self.slot.state.lock() = next;
    }
}
