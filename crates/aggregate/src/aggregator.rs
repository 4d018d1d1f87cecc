use sentiment_tail_common::{AggregateState, Update};
use tracing::debug;

/// Single-writer accumulator of per-group statistics.
///
/// Strictly additive: there is no removal, reset, or decay. Windowed views
/// belong in a wrapper around this type.
#[derive(Debug, Default)]
pub struct GroupAggregator {
    state: AggregateState,
}

impl GroupAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one update into its group, creating the group on first sight.
    pub fn apply(&mut self, update: Update) {
        if self.state.get(update.group.as_str()).is_none() {
            debug!(group = %update.group, "new group");
        }
        self.state.entry(&update.group).record(update.value);
    }

    /// Independent copy of the current state.
    pub fn snapshot(&self) -> AggregateState {
        self.state.clone()
    }

    /// Borrowed read-only view, valid until the next `apply`.
    pub fn view(&self) -> &AggregateState {
        &self.state
    }
}
