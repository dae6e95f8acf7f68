//! System addresses and actor paths.
//!
//! An [`Address`] identifies a system (`movie://name` locally,
//! `movie.tcp://name@host:port` across the wire); an [`ActorPath`] appends
//! the position of one actor inside that system's spawn tree. Both types
//! parse from and format to canonical strings, and
//! `parse(format(p)) == p` holds for every valid value.

pub mod actor_path;
pub mod address;

pub use actor_path::ActorPath;
pub use address::{Address, Endpoint, Protocol};
