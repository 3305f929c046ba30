pub mod dos;
pub mod nt;

pub use dos::DosHeader;
pub use nt::{NtHeader, NtSignature};

use std::io;

pub trait Header: std::fmt::Debug + Sized {
    /// Number of bytes `from_reader` consumes.
    const SIZE: usize;

    /// Decodes the header from the current position of `cur`.
    fn from_reader<R: io::Read>(cur: &mut R) -> anyhow::Result<Self>;

    /// Returns true if the header's signature matches the expected magic.
    fn is_valid(&self) -> bool;

    /// Returns a short human-readable name, e.g. "DOS" or "NT".
    fn format_name(&self) -> &'static str;

    /// Decodes the header at `offset` within `data`.
    ///
    /// Returns `None` when fewer than `SIZE` bytes are available there.
    fn at(data: &[u8], offset: usize) -> Option<Self> {
        let end = offset.checked_add(Self::SIZE)?;
        let mut slice = data.get(offset..end)?;
        Self::from_reader(&mut slice).ok()
    }
}
