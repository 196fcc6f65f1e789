//! Forward-only status orderings
//!
//! Every aggregate status (session, order, line, bill) is totally ordered by
//! [`Lifecycle::rank`]. Servers only validate explicit transitions; clients
//! merge pushed deltas monotonically by rank and never leave a terminal state
//! through a delta.

/// A status with a total order and terminal states.
pub trait Lifecycle: Copy + Eq {
    /// Position in the forward ordering (0 = initial)
    fn rank(&self) -> u8;

    /// No further transitions are possible
    fn is_terminal(&self) -> bool;

    /// Wire representation
    fn as_str(&self) -> &'static str;

    /// Monotonic merge: would moving from `self` to `incoming` be a forward
    /// (or same-state) step for a client cache?
    fn accepts(&self, incoming: &Self) -> bool {
        if self.is_terminal() {
            return *self == *incoming;
        }
        incoming.rank() >= self.rank()
    }
}
