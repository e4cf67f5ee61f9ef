//! The closed set of status codes the administrative protocol uses in
//! response headers (§3). The gateway originates only `Ok` and `Cant`
//! locally; every other variant only ever arrives from the daemon and is
//! relayed through unchanged.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Syntax,
    Unknown,
    Unimpl,
    TooFew,
    TooMany,
    Param,
    Auth,
    Ok,
    Cant,
    Comms,
    Close,
}

impl Status {
    pub fn code(self) -> u32 {
        match self {
            Status::Syntax => 100,
            Status::Unknown => 101,
            Status::Unimpl => 102,
            Status::TooFew => 104,
            Status::TooMany => 105,
            Status::Param => 106,
            Status::Auth => 107,
            Status::Ok => 200,
            Status::Cant => 300,
            Status::Comms => 400,
            Status::Close => 500,
        }
    }

    pub fn from_code(code: u32) -> Option<Status> {
        Some(match code {
            100 => Status::Syntax,
            101 => Status::Unknown,
            102 => Status::Unimpl,
            104 => Status::TooFew,
            105 => Status::TooMany,
            106 => Status::Param,
            107 => Status::Auth,
            200 => Status::Ok,
            300 => Status::Cant,
            400 => Status::Comms,
            500 => Status::Close,
            _ => return None,
        })
    }

    pub fn is_ok(self) -> bool {
        matches!(self, Status::Ok)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
