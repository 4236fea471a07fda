//! Keep a VIP allow-list in sync across game servers.
//!
//! The servers speak a line-oriented remote console (RCON) protocol over
//! plain TCP, obfuscated with a per-connection XOR key. [`rcon`] implements
//! the client side; [`sync`] diffs a desired VIP set against each server's
//! live list and issues the add/delete commands.

pub mod cli;
pub mod config;
pub mod error;
pub mod rcon;
pub mod records;
pub mod registry;
pub mod sync;

pub use error::{Result, SyncError};
