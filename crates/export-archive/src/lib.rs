//! # export-archive
//!
//! Bundle already-rendered export files into one archive: zip, 7z or tar.gz.
//!
//! ## How it works
//!
//! The caller supplies an ordered list of [`ArchiveMember`]s (a file on disk
//! plus the relative name it should carry inside the archive) and a
//! destination path. [`create_archive`]:
//!
//! 1. Validates every member name (relative, no `..`, not empty).
//! 2. Writes the container into a temp file next to `dest`.
//! 3. Renames the temp file onto `dest` only once every member was written.
//!
//! A failure at any step leaves no file at `dest`: callers that need
//! all-or-nothing batches get it for free.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use export_archive::{create_archive, ArchiveFormat, ArchiveMember};
//! use std::path::Path;
//!
//! let members = vec![
//!     ArchiveMember::new("/tmp/export/report.pdf", "report.pdf"),
//!     ArchiveMember::new("/tmp/export/data.csv", "tables/data.csv"),
//! ];
//! let format: ArchiveFormat = "tar.gz".parse().unwrap();
//! create_archive(format, Path::new("/tmp/export/bundle.tar.gz"), &members).unwrap();
//! ```
//!
//! Members are stored in input order.

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, info};

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by archive assembly.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The requested container format is not one of zip, 7z, tar.gz.
    #[error("Unsupported archive format '{0}'\nSupported formats: zip, 7z, tar.gz")]
    UnsupportedFormat(String),

    /// A member name would escape the archive root or is empty.
    #[error("Invalid archive member name '{name}': {reason}")]
    InvalidMemberName { name: String, reason: String },

    /// A member file could not be read, or the archive could not be written.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The zip writer rejected an entry.
    #[error("Zip write failed: {0}")]
    Zip(String),

    /// The 7z writer rejected an entry.
    #[error("7z write failed: {0}")]
    SevenZ(String),
}

impl ArchiveError {
    fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ArchiveError::Io {
            path: path.into(),
            source,
        }
    }
}

// ── Public types ─────────────────────────────────────────────────────────────

/// Container format for [`create_archive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveFormat {
    /// Deflate-compressed zip (default).
    #[default]
    Zip,
    /// LZMA2-compressed 7z.
    SevenZ,
    /// Gzip-compressed tar.
    TarGz,
}

impl ArchiveFormat {
    /// File extension without the leading dot, e.g. `tar.gz`.
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::SevenZ => "7z",
            ArchiveFormat::TarGz => "tar.gz",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ArchiveFormat {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "zip" => Ok(ArchiveFormat::Zip),
            "7z" => Ok(ArchiveFormat::SevenZ),
            "tar.gz" | "tgz" => Ok(ArchiveFormat::TarGz),
            other => Err(ArchiveError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// One file to place inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    /// File on disk.
    pub source: PathBuf,
    /// Relative name inside the archive, `/`-separated.
    pub name: String,
}

impl ArchiveMember {
    pub fn new(source: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
        }
    }
}

// ── Entry point ──────────────────────────────────────────────────────────────

/// Write `members` into a new archive at `dest`.
///
/// Returns the size of the finished archive in bytes. On error nothing is
/// left at `dest`.
pub fn create_archive(
    format: ArchiveFormat,
    dest: &Path,
    members: &[ArchiveMember],
) -> Result<u64, ArchiveError> {
    for member in members {
        validate_member_name(&member.name)?;
    }

    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| ArchiveError::io(dir, e))?;
    let file = tmp
        .as_file()
        .try_clone()
        .map_err(|e| ArchiveError::io(tmp.path(), e))?;

    debug!(
        "Writing {} archive with {} members to {}",
        format,
        members.len(),
        dest.display()
    );

    match format {
        ArchiveFormat::Zip => write_zip(file, members)?,
        ArchiveFormat::SevenZ => write_seven_z(file, members)?,
        ArchiveFormat::TarGz => write_tar_gz(file, members)?,
    }

    tmp.persist(dest)
        .map_err(|e| ArchiveError::io(dest, e.error))?;

    let size = std::fs::metadata(dest)
        .map_err(|e| ArchiveError::io(dest, e))?
        .len();
    info!("Archive ready: {} ({} bytes)", dest.display(), size);
    Ok(size)
}

/// Reject names that are empty, absolute, or climb out of the archive root.
pub fn validate_member_name(name: &str) -> Result<(), ArchiveError> {
    let invalid = |reason: &str| ArchiveError::InvalidMemberName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    let path = Path::new(name);
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return Err(invalid("'..' is not allowed")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("absolute paths are not allowed"))
            }
        }
    }
    Ok(())
}

// ── Writers ──────────────────────────────────────────────────────────────────

fn write_zip(file: File, members: &[ArchiveMember]) -> Result<(), ArchiveError> {
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    let mut zip = ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for member in members {
        let mut source =
            File::open(&member.source).map_err(|e| ArchiveError::io(&member.source, e))?;
        zip.start_file(member.name.as_str(), options)
            .map_err(|e| ArchiveError::Zip(e.to_string()))?;
        io::copy(&mut source, &mut zip).map_err(|e| ArchiveError::io(&member.source, e))?;
    }

    let mut file = zip.finish().map_err(|e| ArchiveError::Zip(e.to_string()))?;
    file.flush().map_err(|e| ArchiveError::io("<zip>", e))
}

fn write_tar_gz(file: File, members: &[ArchiveMember]) -> Result<(), ArchiveError> {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    for member in members {
        builder
            .append_path_with_name(&member.source, &member.name)
            .map_err(|e| ArchiveError::io(&member.source, e))?;
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| ArchiveError::io("<tar>", e))?;
    let mut file = encoder.finish().map_err(|e| ArchiveError::io("<gzip>", e))?;
    file.flush().map_err(|e| ArchiveError::io("<gzip>", e))
}

fn write_seven_z(file: File, members: &[ArchiveMember]) -> Result<(), ArchiveError> {
    use sevenz_rust::{SevenZArchiveEntry, SevenZWriter};

    let mut writer = SevenZWriter::new(file).map_err(|e| ArchiveError::SevenZ(e.to_string()))?;
    for member in members {
        let source =
            File::open(&member.source).map_err(|e| ArchiveError::io(&member.source, e))?;
        let entry = SevenZArchiveEntry::from_path(&member.source, member.name.clone());
        writer
            .push_archive_entry(entry, Some(source))
            .map_err(|e| ArchiveError::SevenZ(e.to_string()))?;
    }
    writer
        .finish()
        .map_err(|e| ArchiveError::SevenZ(e.to_string()))?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn fixture(dir: &Path) -> Vec<ArchiveMember> {
        std::fs::write(dir.join("a.txt"), "alpha").unwrap();
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("nested/b.csv"), "x,y\r\n1,2\r\n").unwrap();
        vec![
            ArchiveMember::new(dir.join("a.txt"), "a.txt"),
            ArchiveMember::new(dir.join("nested/b.csv"), "nested/b.csv"),
        ]
    }

    #[test]
    fn format_parsing() {
        assert_eq!("zip".parse::<ArchiveFormat>().unwrap(), ArchiveFormat::Zip);
        assert_eq!("".parse::<ArchiveFormat>().unwrap(), ArchiveFormat::Zip);
        assert_eq!("7Z".parse::<ArchiveFormat>().unwrap(), ArchiveFormat::SevenZ);
        assert_eq!(
            "tar.gz".parse::<ArchiveFormat>().unwrap(),
            ArchiveFormat::TarGz
        );
        assert!(matches!(
            "rar".parse::<ArchiveFormat>(),
            Err(ArchiveError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn member_names_are_validated() {
        assert!(validate_member_name("report.pdf").is_ok());
        assert!(validate_member_name("dir/report.pdf").is_ok());
        assert!(validate_member_name("").is_err());
        assert!(validate_member_name("../escape.txt").is_err());
        assert!(validate_member_name("/etc/passwd").is_err());
    }

    #[test]
    fn zip_contains_members_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let members = fixture(dir.path());
        let dest = dir.path().join("bundle.zip");

        let size = create_archive(ArchiveFormat::Zip, &dest, &members).unwrap();
        assert!(size > 0);

        let mut archive = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        assert_eq!(archive.by_index(0).unwrap().name(), "a.txt");
        let mut body = String::new();
        archive
            .by_name("nested/b.csv")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "x,y\r\n1,2\r\n");
    }

    #[test]
    fn tar_gz_contains_members() {
        let dir = tempfile::tempdir().unwrap();
        let members = fixture(dir.path());
        let dest = dir.path().join("bundle.tar.gz");

        create_archive(ArchiveFormat::TarGz, &dest, &members).unwrap();

        let gz = flate2::read::GzDecoder::new(File::open(&dest).unwrap());
        let mut archive = tar::Archive::new(gz);
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "nested/b.csv"]);
    }

    #[test]
    fn seven_z_has_signature() {
        let dir = tempfile::tempdir().unwrap();
        let members = fixture(dir.path());
        let dest = dir.path().join("bundle.7z");

        create_archive(ArchiveFormat::SevenZ, &dest, &members).unwrap();

        let bytes = std::fs::read(&dest).unwrap();
        assert_eq!(&bytes[..6], &[b'7', b'z', 0xBC, 0xAF, 0x27, 0x1C]);
    }

    #[test]
    fn missing_member_leaves_no_archive() {
        let dir = tempfile::tempdir().unwrap();
        let mut members = fixture(dir.path());
        members.push(ArchiveMember::new(dir.path().join("ghost.pdf"), "ghost.pdf"));
        let dest = dir.path().join("bundle.zip");

        let err = create_archive(ArchiveFormat::Zip, &dest, &members).unwrap_err();
        assert!(matches!(err, ArchiveError::Io { .. }), "got: {err}");
        assert!(!dest.exists());
    }

    #[test]
    fn invalid_name_fails_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let members = vec![ArchiveMember::new(dir.path().join("a.txt"), "../a.txt")];
        let dest = dir.path().join("bundle.tar.gz");

        assert!(matches!(
            create_archive(ArchiveFormat::TarGz, &dest, &members),
            Err(ArchiveError::InvalidMemberName { .. })
        ));
        assert!(!dest.exists());
    }
}
