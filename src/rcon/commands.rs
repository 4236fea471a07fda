//! VIP command vocabulary on top of a [`Session`].
//!
//! Commands are plain text. Replies have no structure beyond what each
//! command documents: `login` answers `SUCCESS` on success, `get vipids`
//! answers a tab-separated listing, `vipadd`/`vipdel` answers are ignored.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::error::Result;
use crate::rcon::session::Session;
use crate::records::VipEntry;

/// Exact reply the server gives to a good password.
pub const LOGIN_SUCCESS: &str = "SUCCESS";

pub fn login_command(password: &str) -> String {
    format!("login {}", password)
}

pub const LIST_VIPS_COMMAND: &str = "get vipids";

/// `vipadd <id> "<name>"` with quotes stripped from the name and the result
/// trimmed, since the server has no escape syntax.
pub fn add_vip_command(identifier: &str, display_name: &str) -> String {
    format!(
        "vipadd {} \"{}\"",
        identifier,
        display_name.replace('"', "").trim()
    )
}

/// `vipdel <id>`, where the id is everything before the first space of a raw
/// listing entry.
pub fn delete_vip_command(raw_entry: &str) -> String {
    format!("vipdel {}", entry_identifier(raw_entry))
}

/// Split a `get vipids` reply into raw entries.
///
/// Fields are tab-separated and empty fields are discarded. The first field is
/// a status/count token, not a VIP, and is dropped. A display name that
/// contains a tab will split into two bogus entries; the wire format offers no
/// way to tell.
pub fn parse_vip_listing(response: &str) -> Vec<String> {
    response
        .split('\t')
        .filter(|field| !field.is_empty())
        .skip(1)
        .map(str::to_string)
        .collect()
}

/// Identifier part of a raw entry: the text before the first space.
pub fn entry_identifier(raw_entry: &str) -> &str {
    raw_entry
        .split_once(' ')
        .map_or(raw_entry, |(identifier, _)| identifier)
}

/// Parse `<id> "<name>"` into a [`VipEntry`], stripping quotes from the name.
/// An entry with no space yields an empty name.
pub fn parse_vip_entry(raw_entry: &str) -> VipEntry {
    let (identifier, name) = raw_entry.split_once(' ').unwrap_or((raw_entry, ""));
    VipEntry::new(identifier, name.replace('"', ""))
}

/// The VIP operations the reconciler needs from a server.
///
/// Implemented by [`Session`]; tests substitute an in-memory console.
#[async_trait]
pub trait VipConsole: Send {
    /// True iff the server answered exactly `SUCCESS`.
    async fn login(&mut self, password: &str) -> Result<bool>;

    /// Raw `<id> "<name>"` entries currently on the server.
    async fn list_vips(&mut self) -> Result<Vec<String>>;

    async fn add_vip(&mut self, identifier: &str, display_name: &str) -> Result<()>;

    /// Remove the VIP a raw listing entry refers to.
    async fn delete_vip(&mut self, raw_entry: &str) -> Result<()>;
}

#[async_trait]
impl<S> VipConsole for Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn login(&mut self, password: &str) -> Result<bool> {
        let response = self.request(&login_command(password)).await?;
        Ok(response == LOGIN_SUCCESS)
    }

    async fn list_vips(&mut self) -> Result<Vec<String>> {
        let response = self.request(LIST_VIPS_COMMAND).await?;
        let entries = parse_vip_listing(&response);
        debug!(peer = %self.peer(), count = entries.len(), "listed VIPs");
        Ok(entries)
    }

    async fn add_vip(&mut self, identifier: &str, display_name: &str) -> Result<()> {
        let response = self
            .request(&add_vip_command(identifier, display_name))
            .await?;
        debug!(peer = %self.peer(), %identifier, %response, "vipadd answered");
        Ok(())
    }

    async fn delete_vip(&mut self, raw_entry: &str) -> Result<()> {
        let response = self.request(&delete_vip_command(raw_entry)).await?;
        debug!(peer = %self.peer(), entry = %raw_entry, %response, "vipdel answered");
        Ok(())
    }
}
