/// Whether the `initial` slot of a channel can still be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialSlot {
    Open,
    Taken,
}

/// Initial and latest value of one channel.
///
/// `initial` is written by the first cold-start activation only and survives
/// every later activation; `latest` follows every activation. Only
/// [`ChannelState::reset`] clears both.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelState<T> {
    initial: Option<T>,
    latest: Option<T>,
    slot: InitialSlot,
}

impl<T> Default for ChannelState<T> {
    fn default() -> Self {
        Self {
            initial: None,
            latest: None,
            slot: InitialSlot::Open,
        }
    }
}

impl<T: Clone> ChannelState<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial(&self) -> Option<&T> {
        self.initial.as_ref()
    }

    pub fn latest(&self) -> Option<&T> {
        self.latest.as_ref()
    }

    pub fn slot(&self) -> InitialSlot {
        self.slot
    }

    /// Records the value carried by one activation. Returns `true` when the
    /// value also became the channel's initial value.
    pub fn apply_activation(&mut self, value: Option<T>, cold_start: bool) -> bool {
        let fills_initial = cold_start && self.slot == InitialSlot::Open;
        if fills_initial {
            self.initial = value.clone();
            self.slot = InitialSlot::Taken;
        }
        self.latest = value;
        fills_initial
    }

    pub fn clear_latest(&mut self) {
        self.latest = None;
    }

    /// Clears both values. The initial slot stays taken for the life of the process.
    pub fn reset(&mut self) {
        self.initial = None;
        self.latest = None;
    }
}
