//! Block and transaction notifications.

pub mod fanout;
pub mod listener;
pub mod poller;

pub use fanout::{
    ChannelSubscriber, DeliveryError, DeliveryReport, Event, EventCategory, EventFanOut,
    PublishedEvents, Subscriber,
};
pub use listener::{NodeEvent, NodeEventListener};
pub use poller::{NodePoller, PollError};
