//! Patching whole add-on jars
//!
//! Only `.class` entries are looked at. Everything else (and every class that doesn't need
//! patching) is copied over without being decompressed, so it comes out byte-for-byte the same.

use crate::patch::{patch_class, Profile};
use std::fmt;
use std::fs;
use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Zip(ZipError),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<ZipError> for Error {
    fn from(err: ZipError) -> Error {
        Error::Zip(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Zip(err) => write!(f, "invalid jar: {}", err),
        }
    }
}

impl std::error::Error for Error {}

/// What happened to the entries of a jar
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JarReport {
    /// Number of entries in the jar
    pub entries: usize,

    /// Class entries that were rewritten
    pub patched: Vec<String>,

    /// Class entries that could not be decoded or patched, and were copied as they were
    pub skipped: Vec<String>,
}

impl JarReport {
    pub fn changed(&self) -> bool {
        !self.patched.is_empty()
    }
}

/// Copy a jar from `reader` into `writer`, patching classes along the way
pub fn patch_jar<R, W>(reader: R, writer: W, profile: Profile) -> Result<JarReport, Error>
where
    R: Read + Seek,
    W: Write + Seek,
{
    let mut archive = ZipArchive::new(reader)?;
    let mut output = ZipWriter::new(writer);
    let mut report = JarReport {
        entries: archive.len(),
        ..JarReport::default()
    };

    for idx in 0..archive.len() {
        let name = archive.by_index_raw(idx)?.name().to_owned();
        if !name.ends_with(".class") {
            output.raw_copy_file(archive.by_index_raw(idx)?)?;
            continue;
        }

        let (bytes, unix_mode) = match read_entry(&mut archive, idx) {
            Ok(contents) => contents,
            Err(err) => {
                log::warn!("Leaving {} as it is: {}", name, err);
                output.raw_copy_file(archive.by_index_raw(idx)?)?;
                report.skipped.push(name);
                continue;
            }
        };

        match patch_class(&bytes, profile) {
            Ok(patched) if patched.changed => {
                log::info!(
                    "Patched {} ({} substitutions)",
                    name,
                    patched.substitutions.total()
                );
                let mut options =
                    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
                if let Some(mode) = unix_mode {
                    options = options.unix_permissions(mode);
                }
                output.start_file(name.as_str(), options)?;
                output.write_all(&patched.bytes)?;
                report.patched.push(name);
            }
            Ok(_) => {
                output.raw_copy_file(archive.by_index_raw(idx)?)?;
            }
            Err(err) => {
                log::warn!("Leaving {} as it is: {}", name, err);
                output.raw_copy_file(archive.by_index_raw(idx)?)?;
                report.skipped.push(name);
            }
        }
    }

    output.finish()?;
    Ok(report)
}

/// Largest buffer reserved up front for a class entry
const MAX_PREALLOCATED_CLASS_SIZE: u64 = 1 << 20;

/// Decompressed contents and unix permissions of an entry
fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    idx: usize,
) -> Result<(Vec<u8>, Option<u32>), ZipError> {
    let mut entry = archive.by_index(idx)?;
    let mut bytes = Vec::with_capacity(initial_capacity(entry.size()));
    entry.read_to_end(&mut bytes)?;
    Ok((bytes, entry.unix_mode()))
}

/// Buffer size to reserve for an entry, given the size the archive claims it has
///
/// The claimed size is only a hint and is never trusted beyond a generous class size.
fn initial_capacity(declared_size: u64) -> usize {
    declared_size.min(MAX_PREALLOCATED_CLASS_SIZE) as usize
}

/// Patch a jar on disk
///
/// The file is only written to if some class in it changed.
pub fn patch_jar_file(path: &Path, profile: Profile) -> Result<JarReport, Error> {
    let original = fs::read(path)?;
    let mut patched = Cursor::new(Vec::new());
    let report = patch_jar(Cursor::new(original), &mut patched, profile)?;
    if report.changed() {
        fs::write(path, patched.into_inner())?;
        log::info!(
            "Rewrote {} ({} classes patched)",
            path.display(),
            report.patched.len()
        );
    }
    Ok(report)
}

/// Patch every `.jar` file directly inside a directory
///
/// Jars are processed one by one (in name order) and each gets its own result, so one broken jar
/// doesn't keep the others from getting patched.
pub fn patch_directory(
    dir: &Path,
    profile: Profile,
) -> Result<Vec<(PathBuf, Result<JarReport, Error>)>, Error> {
    let mut jars = vec![];
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_jar(&path) {
            jars.push(path);
        }
    }
    jars.sort();

    Ok(jars
        .into_iter()
        .map(|jar| {
            let result = patch_jar_file(&jar, profile);
            if let Err(err) = &result {
                log::error!("Failed to patch {}: {}", jar.display(), err);
            }
            (jar, result)
        })
        .collect())
}

pub fn is_jar(path: &Path) -> bool {
    path.extension().map_or(false, |extension| extension == "jar")
}
