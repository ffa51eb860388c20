//! Packed seed files and directory loading.
//!
//! Layout: `u8 locator_len || locator || BE16(name_len) || name || item*`,
//! each item 8 bytes big-endian. Files may be gzip-compressed (`.gz`).

use std::{
    fs::File,
    io::{BufRead, BufReader, Read, Write},
    path::{Path, PathBuf},
};

use flate2::{read::GzDecoder, write::GzEncoder, Compression};

use crate::{
    catalog::{CatalogLoader, CategoryRecord, SeedCatalog},
    errors::TicketError,
    types::{Item, ITEM_LEN, MAX_CATEGORY},
};

/// Parsed contents of one seed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedFile {
    pub locator: String,
    pub display_name: String,
    pub items: Vec<Item>,
}

/// `NNN.seeds`
#[must_use]
pub fn seed_file_name(number: u8) -> String {
    format!("{number:03}.seeds")
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("gz"))
}

/// # Errors
///
/// `SeedFile` on empty or truncated headers, invalid UTF-8 or a trailing
/// partial item;
/// `Io` on read failure.
pub fn parse_seed_file<R: Read>(mut reader: R) -> Result<SeedFile, TicketError> {
    let mut len = [0u8; 1];
    reader
        .read_exact(&mut len)
        .map_err(|_| TicketError::SeedFile("missing locator length"))?;
    if len[0] == 0 {
        return Err(TicketError::SeedFile("empty locator"));
    }
    let mut locator = vec![0u8; usize::from(len[0])];
    reader
        .read_exact(&mut locator)
        .map_err(|_| TicketError::SeedFile("truncated locator"))?;

    let mut len = [0u8; 2];
    reader
        .read_exact(&mut len)
        .map_err(|_| TicketError::SeedFile("missing name length"))?;
    let name_len = usize::from(u16::from_be_bytes(len));
    if name_len == 0 {
        return Err(TicketError::SeedFile("empty name"));
    }
    let mut name = vec![0u8; name_len];
    reader
        .read_exact(&mut name)
        .map_err(|_| TicketError::SeedFile("truncated name"))?;

    let mut body = Vec::new();
    reader.read_to_end(&mut body)?;
    if body.len() % ITEM_LEN != 0 {
        return Err(TicketError::SeedFile("trailing partial item"));
    }
    let items = body
        .chunks_exact(ITEM_LEN)
        .map(Item::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SeedFile {
        locator: String::from_utf8(locator).map_err(|_| TicketError::SeedFile("locator is not UTF-8"))?,
        display_name: String::from_utf8(name).map_err(|_| TicketError::SeedFile("name is not UTF-8"))?,
        items,
    })
}

/// Read a seed file, decompressing when the path ends in `.gz`.
///
/// # Errors
///
/// See [`parse_seed_file`].
pub fn load_seed_file(path: &Path, sort: bool) -> Result<SeedFile, TicketError> {
    let file = File::open(path)?;
    let mut parsed = if is_gzip(path) {
        parse_seed_file(BufReader::new(GzDecoder::new(file)))?
    } else {
        parse_seed_file(BufReader::new(file))?
    };
    if sort {
        parsed.items.sort_unstable();
    }
    Ok(parsed)
}

/// Serialize a seed file. Items are written in the given order unless `sort` is set.
///
/// # Errors
///
/// `SeedFile` when the locator or name is empty, or longer than 255 and
/// 65535 bytes respectively.
pub fn pack_seed_file(
    locator: &str,
    display_name: &str,
    items: &[Item],
    sort: bool,
) -> Result<Vec<u8>, TicketError> {
    if locator.is_empty() || display_name.is_empty() {
        return Err(TicketError::SeedFile("empty locator or name"));
    }
    let locator_len =
        u8::try_from(locator.len()).map_err(|_| TicketError::SeedFile("locator too long"))?;
    let name_len =
        u16::try_from(display_name.len()).map_err(|_| TicketError::SeedFile("name too long"))?;

    let mut items = items.to_vec();
    if sort {
        items.sort_unstable();
    }
    let mut v = Vec::with_capacity(3 + locator.len() + display_name.len() + items.len() * ITEM_LEN);
    v.push(locator_len);
    v.extend_from_slice(locator.as_bytes());
    v.extend_from_slice(&name_len.to_be_bytes());
    v.extend_from_slice(display_name.as_bytes());
    for item in &items {
        v.extend_from_slice(&item.0);
    }
    Ok(v)
}

/// Write a packed seed file, gzip-compressing when the path ends in `.gz`.
///
/// # Errors
///
/// `Io` on write failure.
pub fn write_seed_file(path: &Path, packed: &[u8]) -> Result<(), TicketError> {
    let file = File::create(path)?;
    if is_gzip(path) {
        let mut enc = GzEncoder::new(file, Compression::best());
        enc.write_all(packed)?;
        enc.finish()?;
    } else {
        let mut file = file;
        file.write_all(packed)?;
    }
    Ok(())
}

/// One integer per line; blank and non-numeric lines are skipped. Values
/// outside the 64-bit range wrap modulo 2^64.
///
/// # Errors
///
/// `Io` on read failure.
pub fn read_seed_list<R: BufRead>(reader: R) -> Result<Vec<Item>, TicketError> {
    let mut items = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.parse::<i128>() {
            // truncation keeps the low 64 bits
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            Ok(v) => items.push(Item::from_u64(v as u64)),
            Err(_) => tracing::debug!(line, "skipping non-numeric seed line"),
        }
    }
    Ok(items)
}

/// [`read_seed_list`] over a file, decompressing when the path ends in `.gz`.
///
/// # Errors
///
/// `Io` on open or read failure.
pub fn load_seed_list(path: &Path) -> Result<Vec<Item>, TicketError> {
    let file = File::open(path)?;
    if is_gzip(path) {
        read_seed_list(BufReader::new(GzDecoder::new(file)))
    } else {
        read_seed_list(BufReader::new(file))
    }
}

/// Loads `NNN.seeds` / `NNN.seeds.gz` for every category number from a directory.
///
/// Missing numbers are skipped; unreadable files are logged and skipped.
#[derive(Debug, Clone)]
pub struct SeedDirLoader {
    dir: PathBuf,
}

impl SeedDirLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, number: u8) -> Option<PathBuf> {
        let plain = self.dir.join(seed_file_name(number));
        let gz = self.dir.join(format!("{}.gz", seed_file_name(number)));
        [gz, plain].into_iter().find(|p| p.is_file())
    }
}

impl CatalogLoader for SeedDirLoader {
    fn load(&self) -> Result<SeedCatalog, TicketError> {
        if !self.dir.is_dir() {
            return Err(TicketError::InvalidConfig(format!(
                "seed directory {} does not exist",
                self.dir.display()
            )));
        }
        let mut records = Vec::new();
        for number in 0..=MAX_CATEGORY {
            let Some(path) = self.path_for(number) else { continue };
            match load_seed_file(&path, false) {
                Ok(file) => {
                    tracing::debug!(
                        category = number,
                        items = file.items.len(),
                        path = %path.display(),
                        "loaded seed file"
                    );
                    records.push(CategoryRecord::new(
                        u16::from(number),
                        file.locator,
                        file.display_name,
                        file.items,
                    )?);
                }
                Err(e) => {
                    tracing::warn!(category = number, path = %path.display(), error = %e, "skipping unreadable seed file");
                }
            }
        }
        let catalog = SeedCatalog::new(records)?;
        tracing::info!(
            categories = catalog.len(),
            items = catalog.total_items(),
            dir = %self.dir.display(),
            "loaded seed catalog"
        );
        Ok(catalog)
    }
}
