//! Agent protocol spoken between the router manager and the hypervisor
//! agents that own router VMs.
//!
//! Every [`Command`] carries a small set of access details telling the agent
//! which router to act on; [`Commands`] groups them into an ordered batch the
//! agent executes in submission order.

pub mod answer;
pub mod batch;
pub mod command;
pub mod to;
pub mod wire;

pub use answer::{Answer, AnswerPayload};
pub use batch::{Commands, OnError};
pub use command::{access, AccessDetails, AggregationAction, Command, CommandBody, PvlanOp};
pub use to::*;
pub use wire::{AgentRequest, AgentResponse};
