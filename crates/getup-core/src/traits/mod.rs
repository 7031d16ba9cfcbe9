//! Collaborator traits: the seams to the document database and push service.

pub mod push;
pub mod store;

pub use push::{ApnsPayload, MulticastMessage, PushTransport, TokenOutcome};
pub use store::{TaskStore, UserStore};
