//! Error taxonomy for archive navigation and entry I/O.
//!
//! Two of these variants are ordinary control-flow signals rather than
//! failures: [`Error::EndOfList`] terminates an entry enumeration loop, and
//! [`Error::NotFound`] reports a name scan that ran to completion without a
//! match. Everything else is a real error the caller must handle.

use thiserror::Error;

/// Errors produced by archive handles, cursors, and entry sessions.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied argument was invalid (oversized transfer length,
    /// operation on a cursor with no selected entry, re-entrant open, ...).
    #[error("invalid argument: {0}")]
    InvalidParameter(&'static str),

    /// The entry enumeration is exhausted. Loop-termination signal, not a
    /// failure; the cursor's index is unchanged when this is returned.
    #[error("end of entry list")]
    EndOfList,

    /// A name scan completed without finding a match.
    #[error("entry not found")]
    NotFound,

    /// The entry is encrypted and no password was supplied.
    #[error("entry is password protected")]
    PasswordRequired,

    /// The entry is encrypted; decryption codecs are not provided here.
    #[error("encrypted entries are not supported")]
    EncryptionUnsupported,

    /// Seeking is only defined for stored (uncompressed) entries.
    #[error("seek requires a stored entry")]
    SeekOnCompressed,

    /// The computed seek position falls outside the entry's data.
    #[error("seek position {0} out of range")]
    SeekOutOfRange(i64),

    /// A 64-bit value does not fit the legacy 32-bit surface.
    #[error("value {0} does not fit in 32 bits")]
    OffsetOverflow(u64),

    /// No entry starts at the given central directory offset.
    #[error("no entry at directory offset {0}")]
    BadOffset(u64),

    /// The archive violates the container format.
    #[error("invalid archive: {0}")]
    Format(String),

    /// An error from the underlying stream, forwarded verbatim.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the enumeration-exhausted signal.
    pub fn is_end_of_list(&self) -> bool {
        matches!(self, Error::EndOfList)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
