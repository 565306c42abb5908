//! StateManager & Publishers (C10): the mediation layer between a
//! transition request and any number of interested sinks. See
//! `manager::StateManager` and `publisher::Publisher`.

pub mod manager;
pub mod publisher;

pub use manager::StateManager;
pub use publisher::{HistoryPublisher, MultiPublisher, NoopPublisher, PubSubPublisher, Publisher, TransitionEvent};
