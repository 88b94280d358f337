//! Per-transport tasks: reading, writing and keepalive.

pub(crate) mod ping;
pub(crate) mod read;
pub(crate) mod write;
