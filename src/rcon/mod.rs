//! Client side of the game server's remote console (RCON) protocol.
//!
//! # Wire format
//!
//! ```text
//! server ──► client   key bytes, in the clear, sent once on connect
//! client ──► server   XOR(key, "login <password>")
//! server ──► client   XOR(key, "SUCCESS")
//! client ──► server   XOR(key, "get vipids")
//! server ──► client   XOR(key, "<count>\t<id> \"<name>\"\t...")
//! ```
//!
//! No length prefix or terminator exists; see [`session`] for how replies
//! are delimited.

pub mod codec;
pub mod commands;
pub mod session;

pub use codec::{transform, CodecError, XorKey};
pub use commands::{
    add_vip_command, delete_vip_command, entry_identifier, login_command, parse_vip_entry,
    parse_vip_listing, VipConsole, LIST_VIPS_COMMAND, LOGIN_SUCCESS,
};
pub use session::{
    Connection, Session, SessionTimings, DEFAULT_CONNECT_TIMEOUT, DEFAULT_IDLE_TIMEOUT,
    DEFAULT_QUIESCENCE, READ_BUFFER_SIZE,
};
