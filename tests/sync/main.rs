//! Outbox and sync engine integration tests.

mod ordering;
mod enqueue;
mod rejection;
mod concurrency;
mod file_store;
