//! Conversion between in-memory commands and their storage and wire forms.
//!
//! - [`StoredCommand`] is the storage form: every field is plain text or an
//!   integer, timestamps are RFC 3339 with nanosecond precision and a `Z`
//!   suffix so they sort lexicographically.
//! - [`DeliveryRequest`] is the wire form handed to a remote endpoint.
//!
//! `decode(&encode(&command)) == Ok(command)` for every valid command.

mod stored;
mod wire;

pub use stored::{decode, encode, format_timestamp, parse_timestamp, CorruptRecord, StoredCommand};
pub use wire::{to_request, DeliveryRequest};
