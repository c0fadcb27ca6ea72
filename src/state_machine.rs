//! Turn-dispatch state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.
//! The runtime feeds events in and executes the effects that come out.

mod effect;
pub mod event;
pub mod linkage;
mod state;
mod transition;


pub use effect::Effect;
pub use event::Event;
pub use state::{TurnContext, TurnState};
pub use transition::{
    pending_calls, transition, TransitionError, TransitionResult, MAX_RETRY_ATTEMPTS,
};
