//! Raw commit object construction.
//!
//! Replacement commits are serialized here byte for byte, so a dry run can
//! compute the exact hash a real run would write without touching the
//! object database.

use anyhow::{Context, Result};
use git2::{ObjectType, Oid, Repository};

use super::commit::Identity;

/// Everything needed to serialize one commit object.
#[derive(Debug, Clone, Copy)]
pub struct CommitObject<'a> {
    /// Tree the commit records.
    pub tree: Oid,
    /// Parents in order.
    pub parents: &'a [Oid],
    /// Author identity.
    pub author: &'a Identity,
    /// Committer identity.
    pub committer: &'a Identity,
    /// Optional message encoding header.
    pub encoding: Option<&'a str>,
    /// Full message bytes, written verbatim.
    pub message: &'a [u8],
}

impl CommitObject<'_> {
    /// Serializes the commit in git's canonical object format.
    ///
    /// Identities and the message are copied as raw bytes, so commits in
    /// legacy encodings survive unchanged.
    pub fn to_buffer(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256 + self.message.len());
        buf.extend_from_slice(format!("tree {}\n", self.tree).as_bytes());
        for parent in self.parents {
            buf.extend_from_slice(format!("parent {parent}\n").as_bytes());
        }
        push_identity(&mut buf, b"author", self.author);
        push_identity(&mut buf, b"committer", self.committer);
        if let Some(encoding) = self.encoding {
            buf.extend_from_slice(format!("encoding {encoding}\n").as_bytes());
        }
        buf.push(b'\n');
        buf.extend_from_slice(self.message);
        buf
    }

    /// Computes the object hash without writing anything.
    pub fn hash(&self) -> Result<Oid> {
        Oid::hash_object(ObjectType::Commit, &self.to_buffer())
            .context("Failed to hash commit object")
    }

    /// Writes the commit into the repository's object database.
    pub fn write(&self, repo: &Repository) -> Result<Oid> {
        let odb = repo.odb().context("Failed to open object database")?;
        odb.write(ObjectType::Commit, &self.to_buffer())
            .context("Failed to write commit object")
    }
}

/// Appends `<header> Name <email> seconds +hhmm` and a newline.
fn push_identity(buf: &mut Vec<u8>, header: &[u8], identity: &Identity) {
    let offset = identity.offset_minutes.unsigned_abs();
    buf.extend_from_slice(header);
    buf.push(b' ');
    buf.extend_from_slice(&identity.name);
    buf.extend_from_slice(b" <");
    buf.extend_from_slice(&identity.email);
    buf.extend_from_slice(
        format!(
            "> {} {}{:02}{:02}\n",
            identity.seconds,
            identity.sign,
            offset / 60,
            offset % 60
        )
        .as_bytes(),
    );
}

/// Normalizes a generated message so it ends with exactly one newline.
pub fn normalize_message(message: &str) -> String {
    let mut normalized = message.trim_end().to_string();
    normalized.push('\n');
    normalized
}
