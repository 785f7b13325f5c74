//! The LLM admission broker. Every completion request
//! in the system funnels through here before reaching an `LlmClient`, so
//! that a fixed pool of worker slots and a two-class priority queue are
//! the only path to the model, regardless of which component is asking.

mod config;
mod dispatcher;
mod ticket;

pub use config::BrokerConfig;
pub use dispatcher::{Broker, BrokerError};
pub use ticket::{Priority, Ticket};
