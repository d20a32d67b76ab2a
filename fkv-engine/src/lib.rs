//! # fkv-engine
//!
//! The storage layer: a sharded, TTL-aware, typed key-value [`Store`], a
//! background [`janitor`] sweep, an append-only durability [`Aol`], and a
//! publish/subscribe [`Broker`].
//!
//! None of these modules know about the wire protocol; `fkv-server` is the
//! only crate that talks RESP and owns a network socket.

pub mod aol;
pub mod janitor;
pub mod pubsub;
pub mod store;
pub mod value;

pub use aol::Aol;
pub use janitor::{spawn as spawn_janitor, JanitorHandle};
pub use pubsub::{Broker, Subscription, SubscriptionId};
pub use store::Store;
pub use value::{Item, Value, ValueType};
