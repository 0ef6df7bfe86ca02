//! Portable cursor positions.
//!
//! A [`Position`] is the pair a caller externalizes to resume navigation
//! later without rescanning: the selected entry's central directory offset
//! plus the cursor's logical index. The 64-bit form is authoritative;
//! [`Position32`] exists for surfaces that historically carried 32-bit
//! fields. Narrowing is checked: an archive whose directory offset does not
//! fit 32 bits must be rejected, never silently wrapped.

use crate::error::{Error, Result};

/// A resumable cursor position (authoritative 64-bit form).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Central directory offset of the selected entry.
    pub directory_offset: u64,
    /// Logical ordinal of the selected entry, as counted by the cursor.
    pub entry_index: u64,
}

/// Legacy 32-bit position form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position32 {
    pub directory_offset: u32,
    pub entry_index: u32,
}

impl Position {
    /// Narrow to the legacy form, failing if either field overflows.
    pub fn narrow(self) -> Result<Position32> {
        Position32::try_from(self)
    }
}

impl TryFrom<Position> for Position32 {
    type Error = Error;

    fn try_from(pos: Position) -> Result<Self> {
        Ok(Position32 {
            directory_offset: u32::try_from(pos.directory_offset)
                .map_err(|_| Error::OffsetOverflow(pos.directory_offset))?,
            entry_index: u32::try_from(pos.entry_index)
                .map_err(|_| Error::OffsetOverflow(pos.entry_index))?,
        })
    }
}

impl From<Position32> for Position {
    fn from(pos: Position32) -> Self {
        Position {
            directory_offset: pos.directory_offset as u64,
            entry_index: pos.entry_index as u64,
        }
    }
}
