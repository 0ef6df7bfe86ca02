use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::path::Path;

use crate::error::Result;

/// Open a local archive for reading.
pub fn open_for_read(path: &Path) -> Result<File> {
    Ok(File::open(path)?)
}

/// Create (or truncate) a local archive for writing.
pub fn open_for_create(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?)
}

/// Open an existing local archive for appending entries.
///
/// The file is opened read-write and positioned at the start; the archive
/// engine reads the existing directory and decides where new data goes.
pub fn open_for_append(path: &Path) -> Result<File> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    file.seek(SeekFrom::Start(0))?;
    Ok(file)
}
