//! RPC layer - the JSON commands sent to the host and the events it returns.
//!
//! Both halves are pure: [`CommandBuilder`] only needs its nonce counter and
//! [`parse_response`] only inspects the value it is given.

mod command;
mod response;

pub use command::{commands, CommandBuilder, JoinReply, Subscription, RPC_VERSION};
pub use response::parse_response;
