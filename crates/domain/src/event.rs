//! Domain events and the type-discriminator registry used to decode them.

use std::collections::HashMap;

use chrono::{DateTime, SubsecRound, Utc};
use event_store::{EventId, NewEvent};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Trait for domain events.
///
/// Domain events are immutable facts, named in past tense. Each variant has
/// a stable type discriminator; changing a payload's shape without
/// introducing a new discriminator breaks every stored stream.
pub trait DomainEvent: Clone + Send + Sync + Sized + 'static {
    /// Returns the event type discriminator.
    fn event_type(&self) -> &'static str;

    /// Serializes the event payload (without the discriminator).
    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error>;

    /// Returns the registry that maps discriminators back to events.
    fn registry() -> &'static EventRegistry<Self>;
}

/// Error raised when a stored payload cannot be turned back into an event.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// No decoder is registered for the discriminator.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// The payload does not match the registered shape.
    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
}

type Decoder<E> = Box<dyn Fn(serde_json::Value) -> Result<E, serde_json::Error> + Send + Sync>;

/// Maps each event type discriminator to an explicit decode function.
pub struct EventRegistry<E> {
    decoders: HashMap<&'static str, Decoder<E>>,
}

impl<E: 'static> EventRegistry<E> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registers a payload type under a discriminator, with the constructor
    /// that wraps it into the event type.
    pub fn register<P>(mut self, event_type: &'static str, wrap: fn(P) -> E) -> Self
    where
        P: DeserializeOwned + 'static,
    {
        let previous = self.decoders.insert(
            event_type,
            Box::new(move |payload| serde_json::from_value::<P>(payload).map(wrap)),
        );
        debug_assert!(
            previous.is_none(),
            "event type {event_type} registered twice"
        );
        self
    }

    /// Decodes a stored payload using the decoder registered for `event_type`.
    pub fn decode(&self, event_type: &str, payload: serde_json::Value) -> Result<E, DecodeError> {
        let decoder = self
            .decoders
            .get(event_type)
            .ok_or_else(|| DecodeError::UnknownEventType(event_type.to_string()))?;
        Ok(decoder(payload)?)
    }

    /// Returns true if a decoder is registered for `event_type`.
    pub fn contains(&self, event_type: &str) -> bool {
        self.decoders.contains_key(event_type)
    }

    /// Returns the registered discriminators, sorted.
    pub fn event_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.decoders.keys().copied().collect();
        types.sort_unstable();
        types
    }
}

impl<E: 'static> Default for EventRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// An event recorded by an aggregate and not yet appended to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent<E> {
    pub event_id: EventId,
    pub occurred_on: DateTime<Utc>,
    pub event: E,
}

impl<E: DomainEvent> PendingEvent<E> {
    /// Wraps an event with a fresh ID and the current time.
    ///
    /// The timestamp is truncated to microseconds, the precision the
    /// PostgreSQL store keeps, so a snapshot and a replay agree on it.
    pub fn new(event: E) -> Self {
        Self {
            event_id: EventId::new(),
            occurred_on: Utc::now().trunc_subsecs(6),
            event,
        }
    }

    /// Converts to the store's unversioned append form.
    pub fn to_new_event(&self) -> Result<NewEvent, serde_json::Error> {
        Ok(NewEvent::new(self.event.event_type(), self.event.to_payload()?)
            .with_event_id(self.event_id)
            .occurred_on(self.occurred_on))
    }
}
