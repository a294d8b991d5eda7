//! The probes themselves. Each scenario is an ordered sequence of calls that stops at the
//! first unexpected status code and returns it as an error.

pub mod cipher;
pub mod roles;
