//! Line Codec: bidirectional framing for the administrative protocol
//! (§4.1). `frame` handles the fixed-width response header, `quoting`
//! handles argument tokenizing/escaping, `heredoc` handles the ` << TOKEN`
//! convention.

pub mod frame;
pub mod heredoc;
pub mod quoting;

pub use frame::{read_response, write_response};
