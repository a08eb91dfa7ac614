//! Command types shared by every aggregate.

use common::AggregateId;
use event_store::{StoredEvent, Version};

use crate::aggregate::Aggregate;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after the command, with an empty pending buffer.
    pub aggregate: A,

    /// The events that were persisted, in version order.
    pub events: Vec<StoredEvent>,

    /// The version of the aggregate after the command.
    pub new_version: Version,

    /// How many load-mutate-save attempts it took.
    pub attempts: u32,
}

/// Trait for commands that can be executed against an aggregate.
///
/// Commands represent an intention to perform an action. They may be rejected
/// if the aggregate's current state doesn't allow the action.
pub trait Command: Send + Sync {
    /// The type of aggregate this command targets.
    type Aggregate: Aggregate;

    /// Returns the ID of the aggregate this command targets.
    fn aggregate_id(&self) -> AggregateId;
}
