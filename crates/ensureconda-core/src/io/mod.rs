//! Network, archive, and filesystem plumbing.

pub mod extract;
pub mod http;
pub mod install;
