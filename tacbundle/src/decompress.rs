//! Local extraction of downloaded bundles.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use log::{info, warn};

use crate::error::{Error, Result};
use crate::input::InputProvider;

/// Container formats we can unpack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Tar,
    Zip,
}

impl ArchiveFormat {
    const EXTENSIONS: &'static [(&'static str, ArchiveFormat)] = &[
        (".tar.gz", ArchiveFormat::TarGz),
        (".tgz", ArchiveFormat::TarGz),
        (".tar", ArchiveFormat::Tar),
        (".zip", ArchiveFormat::Zip),
    ];

    /// Detect the format from the file name, returning it with the name's stem.
    pub fn detect(filename: &str) -> Option<(ArchiveFormat, &str)> {
        let lower = filename.to_ascii_lowercase();
        Self::EXTENSIONS.iter().find_map(|(ext, format)| {
            lower
                .ends_with(ext)
                .then(|| (*format, &filename[..filename.len() - ext.len()]))
                .filter(|(_, stem)| !stem.is_empty())
        })
    }
}

/// Directory an archive extracts into: its path minus the extension.
pub fn target_dir(archive: &Path) -> Option<(ArchiveFormat, PathBuf)> {
    let name = archive.file_name()?.to_str()?;
    let (format, stem) = ArchiveFormat::detect(name)?;
    Some((format, archive.with_file_name(stem)))
}

/// Extract `archive` next to itself.
///
/// Returns `Ok(None)` without touching anything when the archive does not
/// exist, or when a previous extraction is present and `input` declines to
/// replace it.
pub fn extract(archive: &Path, input: &dyn InputProvider) -> Result<Option<PathBuf>> {
    if !archive.exists() {
        info!("nothing to extract: {} does not exist", archive.display());
        return Ok(None);
    }

    let (format, target) = target_dir(archive).ok_or_else(|| {
        Error::config(format!(
            "unsupported archive type: {}",
            archive.display()
        ))
    })?;

    if target.exists() {
        let question = format!("{} already exists. Replace it?", target.display());
        if !input.confirm(&question)? {
            warn!("keeping existing {}", target.display());
            return Ok(None);
        }
        std::fs::remove_dir_all(&target).map_err(|e| Error::io(&target, e))?;
    }

    std::fs::create_dir_all(&target).map_err(|e| Error::io(&target, e))?;
    if let Err(e) = unpack(archive, format, &target) {
        if let Err(cleanup) = std::fs::remove_dir_all(&target) {
            warn!("cannot remove partial extraction {}: {cleanup}", target.display());
        }
        return Err(Error::io(archive, e));
    }

    info!("extracted {} into {}", archive.display(), target.display());
    Ok(Some(target))
}

fn unpack(archive: &Path, format: ArchiveFormat, target: &Path) -> io::Result<()> {
    let file = BufReader::new(File::open(archive)?);
    match format {
        ArchiveFormat::TarGz => tar::Archive::new(GzDecoder::new(file)).unpack(target),
        ArchiveFormat::Tar => tar::Archive::new(file).unpack(target),
        ArchiveFormat::Zip => zip::ZipArchive::new(file)
            .and_then(|mut zip| zip.extract(target))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::StaticInput;
    use std::io::Write;

    fn write_tar(path: &Path, entries: &[(&str, &[u8])]) {
        let mut builder = tar::Builder::new(File::create(path).unwrap());
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.finish().unwrap();
    }

    #[test]
    fn test_detect() {
        assert_eq!(
            ArchiveFormat::detect("TAC-bundle-1-leaf1-x.tar"),
            Some((ArchiveFormat::Tar, "TAC-bundle-1-leaf1-x"))
        );
        assert_eq!(
            ArchiveFormat::detect("a.TAR.GZ"),
            Some((ArchiveFormat::TarGz, "a"))
        );
        assert_eq!(ArchiveFormat::detect("a.tgz"), Some((ArchiveFormat::TarGz, "a")));
        assert_eq!(
            ArchiveFormat::detect("support-bundle-SR1-x.zip"),
            Some((ArchiveFormat::Zip, "support-bundle-SR1-x"))
        );
        assert_eq!(ArchiveFormat::detect("notes.txt"), None);
        assert_eq!(ArchiveFormat::detect(".zip"), None);
    }

    #[test]
    fn test_missing_source_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let result = extract(&dir.path().join("gone.tar"), &StaticInput::new()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_extract_tar_preserves_structure() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("TAC-bundle-1-leaf1-x.tar");
        write_tar(
            &archive,
            &[("var/log/messages", &b"boot ok"[..]), ("show-tech.log", &b"tech"[..])],
        );

        let target = extract(&archive, &StaticInput::new()).unwrap().unwrap();
        assert_eq!(target, dir.path().join("TAC-bundle-1-leaf1-x"));
        assert_eq!(std::fs::read(target.join("var/log/messages")).unwrap(), b"boot ok");
        assert_eq!(std::fs::read(target.join("show-tech.log")).unwrap(), b"tech");
    }

    #[test]
    fn test_extract_tar_gz() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("inner.tar");
        write_tar(&plain, &[("a.txt", &b"alpha"[..])]);
        let archive = dir.path().join("bundle.tar.gz");
        let mut gz = flate2::write::GzEncoder::new(
            File::create(&archive).unwrap(),
            flate2::Compression::default(),
        );
        gz.write_all(&std::fs::read(&plain).unwrap()).unwrap();
        gz.finish().unwrap();

        let target = extract(&archive, &StaticInput::new()).unwrap().unwrap();
        assert_eq!(std::fs::read(target.join("a.txt")).unwrap(), b"alpha");
    }

    #[test]
    fn test_extract_zip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("support-bundle-SR1-x.zip");
        let mut zip = zip::ZipWriter::new(File::create(&archive).unwrap());
        zip.start_file("logs/agent.log", zip::write::FileOptions::default())
            .unwrap();
        zip.write_all(b"agent").unwrap();
        zip.finish().unwrap();

        let target = extract(&archive, &StaticInput::new()).unwrap().unwrap();
        assert_eq!(std::fs::read(target.join("logs/agent.log")).unwrap(), b"agent");
    }

    #[test]
    fn test_existing_target_needs_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("b.tar");
        write_tar(&archive, &[("new.txt", &b"new"[..])]);
        let target = dir.path().join("b");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("old.txt"), b"old").unwrap();

        let declined = extract(&archive, &StaticInput::new().with_confirm(false)).unwrap();
        assert!(declined.is_none());
        assert!(target.join("old.txt").exists());

        let replaced = extract(&archive, &StaticInput::new().with_confirm(true))
            .unwrap()
            .unwrap();
        assert!(!replaced.join("old.txt").exists());
        assert!(replaced.join("new.txt").exists());
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, b"x").unwrap();
        let err = extract(&file, &StaticInput::new()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }
}
