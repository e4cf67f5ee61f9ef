// This module is used from multiple different test binaries, each of which
// gets compiled separately. Not all of them use all of it.
#![allow(dead_code)]

pub mod console;
pub mod fake_daemon;
pub mod gateway;
