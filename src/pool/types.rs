use serde::Serialize;

/// Lifecycle of a pool handle. A handle only exists once opening succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolState {
    Open,
    Closed,
}

/// Point-in-time connection counts.
///
/// `acquired_conns` never exceeds `max_conns`; `total_conns` is idle plus acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PoolStats {
    pub total_conns: u32,
    pub idle_conns: u32,
    pub acquired_conns: u32,
    pub min_conns: u32,
    pub max_conns: u32,
}

impl PoolStats {
    pub(crate) fn from_state(state: &bb8::State, min_conns: u32, max_conns: u32) -> Self {
        Self {
            total_conns: state.connections,
            idle_conns: state.idle_connections,
            acquired_conns: state.connections.saturating_sub(state.idle_connections),
            min_conns,
            max_conns,
        }
    }

    /// Counts for a closed pool: nothing held, bounds kept.
    pub(crate) fn closed(min_conns: u32, max_conns: u32) -> Self {
        Self {
            min_conns,
            max_conns,
            ..Self::default()
        }
    }
}
