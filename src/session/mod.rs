//! Client Session and Master Session: the two connection state machines the
//! Listener/Supervisor spawns a worker for (§4.5, §4.6).

pub mod client;
pub mod master;
