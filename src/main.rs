//! Main entry point for the zipnav CLI application.
//!
//! This binary provides a command-line interface for listing and extracting
//! ZIP archives from both the local filesystem and remote HTTP URLs, driving
//! everything through the cursor API.

use anyhow::Result;
use clap::Parser;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use zipnav::io::open_for_read;
use zipnav::{ArchiveCursor, ArchiveStream, Cli, EntryMetadata, HttpRangeReader, ZipArchive};

/// Application entry point.
///
/// Parses command-line arguments and dispatches to the appropriate handler
/// based on whether the input is a local file or HTTP URL.
fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if cli.is_http_url() {
        // Remote ZIP file via HTTP Range requests
        let reader = HttpRangeReader::new(cli.file.clone())?;
        let transferred_before = reader.transferred_bytes();

        let mut cursor = ArchiveCursor::new(ZipArchive::open_read(reader)?);
        process_zip(&mut cursor, &cli)?;

        // Display network transfer statistics for HTTP sources
        if !cli.is_quiet() {
            let transferred =
                cursor.handle().stream().transferred_bytes() - transferred_before;
            eprintln!("\nTotal bytes transferred: {}", format_size(transferred));
        }
    } else {
        // Local ZIP file
        let file = open_for_read(Path::new(&cli.file))?;
        let mut cursor = ArchiveCursor::new(ZipArchive::open_read(file)?);
        process_zip(&mut cursor, &cli)?;
    }

    Ok(())
}

/// Walk every entry of the archive, calling `visit` on each.
fn for_each_entry<S: ArchiveStream>(
    cursor: &mut ArchiveCursor<ZipArchive<S>>,
    mut visit: impl FnMut(&mut ArchiveCursor<ZipArchive<S>>, &EntryMetadata) -> Result<()>,
) -> Result<()> {
    let mut step = cursor.goto_first();
    loop {
        match step {
            Ok(()) => {}
            Err(e) if e.is_end_of_list() => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        let meta = cursor.metadata()?;
        visit(cursor, &meta)?;
        step = cursor.goto_next();
    }
}

/// Process a ZIP archive based on CLI options.
///
/// - List mode (`-l` or `-v`): display archive contents
/// - Extract mode: extract files matching the specified filters
fn process_zip<S: ArchiveStream>(
    cursor: &mut ArchiveCursor<ZipArchive<S>>,
    cli: &Cli,
) -> Result<()> {
    // List mode: display archive contents and exit
    if cli.list || cli.verbose {
        return list_files(cursor, cli.verbose);
    }

    // First pass: count the matching files, so pipe mode knows whether to
    // emit per-file separators
    let mut matching = 0usize;
    for_each_entry(cursor, |_, meta| {
        if should_extract(meta, cli) {
            matching += 1;
        }
        Ok(())
    })?;

    let multiple_files = cli.pipe && matching > 1;
    for_each_entry(cursor, |cursor, meta| {
        if should_extract(meta, cli) {
            extract_file(cursor, meta, cli, multiple_files)?;
        }
        Ok(())
    })
}

/// Apply the CLI filters to one entry:
/// 1. Skip directories (created automatically during extraction)
/// 2. If specific files are requested, only include matching entries
/// 3. Exclude files matching the exclusion patterns
fn should_extract(entry: &EntryMetadata, cli: &Cli) -> bool {
    if entry.is_directory {
        return false;
    }

    // If specific files are requested via positional arguments, only
    // include entries that match
    if !cli.files.is_empty() {
        let matches = cli.files.iter().any(|f| {
            if has_glob_chars(f) {
                // Pattern contains wildcards: use glob matching
                glob_match(f, &entry.file_name)
            } else {
                // No wildcards: exact match on filename or full path
                let basename = Path::new(&entry.file_name)
                    .file_name()
                    .map(|s| s.to_string_lossy())
                    .unwrap_or_default();
                entry.file_name == *f || basename == *f
            }
        });
        if !matches {
            return false;
        }
    }

    // Exclude files matching the -x patterns
    if cli
        .exclude
        .iter()
        .any(|x| entry.file_name.contains(x) || glob_match(x, &entry.file_name))
    {
        return false;
    }

    true
}

/// List files in the ZIP archive.
///
/// Supports two output formats:
/// - Simple format (`-l`): just file names, one per line
/// - Verbose format (`-v`): detailed table with size, compression ratio, and
///   timestamps
fn list_files<S: ArchiveStream>(
    cursor: &mut ArchiveCursor<ZipArchive<S>>,
    verbose: bool,
) -> Result<()> {
    if verbose {
        // Print table header for verbose output
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Date", "Time"
        );
        println!("{}", "-".repeat(70));
    }

    // Track totals for summary line
    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for_each_entry(cursor, |_, entry| {
        if verbose {
            // Parse DOS timestamp into human-readable format
            let (year, month, day) = entry.mod_date();
            let (hour, minute, _second) = entry.mod_time();

            // Compression ratio as percentage saved
            let ratio = if entry.uncompressed_size > 0 {
                format!(
                    "{:>4}%",
                    100 - (entry.compressed_size * 100 / entry.uncompressed_size)
                )
            } else {
                "  0%".to_string()
            };

            println!(
                "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
                entry.uncompressed_size,
                entry.compressed_size,
                ratio,
                year,
                month,
                day,
                hour,
                minute,
                entry.file_name
            );

            if !entry.is_directory {
                total_uncompressed += entry.uncompressed_size;
                total_compressed += entry.compressed_size;
                file_count += 1;
            }
        } else {
            // Simple format: just the file name
            println!("{}", entry.file_name);
        }
        Ok(())
    })?;

    // Print summary line in verbose mode
    if verbose {
        println!("{}", "-".repeat(70));
        let total_ratio = if total_uncompressed > 0 {
            format!(
                "{:>4}%",
                100 - (total_compressed * 100 / total_uncompressed)
            )
        } else {
            "  0%".to_string()
        };
        println!(
            "{:>10}  {:>10}  {}  {:>21}  {} files",
            total_uncompressed, total_compressed, total_ratio, "", file_count
        );
    }

    Ok(())
}

/// Extract the entry the cursor is currently positioned on.
///
/// Handles the extraction options:
/// - Pipe mode (`-p`): write to stdout instead of a file
/// - Custom output directory (`-d`): extract to the specified directory
/// - Junk paths (`-j`): ignore directory structure in the archive
/// - Overwrite control (`-n`, `-o`): handle existing files
fn extract_file<S: ArchiveStream>(
    cursor: &mut ArchiveCursor<ZipArchive<S>>,
    entry: &EntryMetadata,
    cli: &Cli,
    show_filename: bool,
) -> Result<()> {
    // Pipe mode: write file contents directly to stdout
    if cli.pipe {
        let stdout = std::io::stdout();
        let mut stdout = stdout.lock();
        if show_filename {
            stdout.write_all(format!("--- {} ---\n", entry.file_name).as_bytes())?;
        }
        return copy_entry(cursor, &mut stdout);
    }

    // Determine the output path based on CLI options
    let file_name = if cli.junk_paths {
        // Junk paths: use only the base filename, ignore directory structure
        Path::new(&entry.file_name)
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| entry.file_name.clone())
    } else {
        // Preserve directory structure from archive
        entry.file_name.clone()
    };
    let output_path = match &cli.extract_dir {
        Some(dir) => PathBuf::from(dir).join(&file_name),
        None => PathBuf::from(&file_name),
    };

    // Handle existing files based on overwrite options
    if output_path.exists() {
        if cli.never_overwrite {
            // -n flag: never overwrite, skip silently (unless quiet)
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (file exists)", entry.file_name);
            }
            return Ok(());
        }

        if !cli.overwrite {
            // Default behavior: skip with suggestion to use -o
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (use -o to overwrite)", entry.file_name);
            }
            return Ok(());
        }
        // -o flag: overwrite without prompting (fall through to extraction)
    }

    if !cli.is_quiet() {
        println!("  extracting: {}", entry.file_name);
    }

    // Create parent directories if needed
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = fs::File::create(&output_path)?;
    copy_entry(cursor, &mut file)
}

/// Stream the selected entry's payload into a writer through a read session.
fn copy_entry<S: ArchiveStream, W: Write>(
    cursor: &mut ArchiveCursor<ZipArchive<S>>,
    out: &mut W,
) -> Result<()> {
    cursor.open_entry(None)?;
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = cursor.read(&mut buf)?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
    }
    cursor.close_entry()?;
    Ok(())
}

/// Check if a pattern contains glob wildcard characters.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
///
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    /// Recursive helper using simple backtracking for `*` wildcards.
    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            // Both exhausted: match successful
            (None, None) => true,
            // Star matches zero or more characters
            (Some('*'), _) => {
                // Try matching zero characters (skip the star)
                // OR matching one character (keep the star for more)
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            // Question mark matches exactly one character
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            // Literal character match
            (Some(p), Some(t)) if *p == *t => do_match(&pattern[1..], &text[1..]),
            // No match
            _ => false,
        }
    }

    do_match(&pattern_chars, &text_chars)
}

/// Format a byte size into a human-readable string.
///
/// Automatically selects the appropriate unit (bytes, KB, MB, GB) based on
/// the size magnitude.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
