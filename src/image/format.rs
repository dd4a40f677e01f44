use crate::host::Tool;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zstd,
    Gzip,
    Xz,
    Plain,
}

impl ArchiveFormat {
    pub fn from_path(path: &Path) -> Option<ArchiveFormat> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".tar.zst") || name.ends_with(".tzst") {
            Some(ArchiveFormat::Zstd)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveFormat::Gzip)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(ArchiveFormat::Xz)
        } else if name.ends_with(".tar") {
            Some(ArchiveFormat::Plain)
        } else {
            None
        }
    }

    /// The tool that can self-test this format, also needed by tar to unpack it.
    pub fn tool(&self) -> Tool {
        match self {
            ArchiveFormat::Zstd => Tool::Zstd,
            ArchiveFormat::Gzip => Tool::Gzip,
            ArchiveFormat::Xz => Tool::Xz,
            ArchiveFormat::Plain => Tool::Tar,
        }
    }

    /// Arguments, placed before the archive path, that make `tool()` verify it.
    pub fn verify_args(&self) -> &'static [&'static str] {
        match self {
            ArchiveFormat::Zstd => &["-t", "-q"],
            ArchiveFormat::Gzip => &["-t"],
            ArchiveFormat::Xz => &["-t"],
            ArchiveFormat::Plain => &["-tf"],
        }
    }

    pub fn tar_flag(&self) -> Option<&'static str> {
        match self {
            ArchiveFormat::Zstd => Some("--zstd"),
            ArchiveFormat::Gzip => Some("--gzip"),
            ArchiveFormat::Xz => Some("--xz"),
            ArchiveFormat::Plain => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        let cases = [
            ("archlinux-bootstrap-x86_64.tar.zst", Some(ArchiveFormat::Zstd)),
            ("rootfs.TAR.GZ", Some(ArchiveFormat::Gzip)),
            ("rootfs.tgz", Some(ArchiveFormat::Gzip)),
            ("rootfs.tar.xz", Some(ArchiveFormat::Xz)),
            ("rootfs.tar", Some(ArchiveFormat::Plain)),
            ("rootfs.zip", None),
            ("", None),
        ];
        for (name, expected) in cases {
            assert_eq!(ArchiveFormat::from_path(Path::new(name)), expected);
        }
    }

    #[test]
    fn test_plain_archives_are_checked_by_tar() {
        assert_eq!(ArchiveFormat::Plain.tool(), Tool::Tar);
        assert_eq!(ArchiveFormat::Plain.tar_flag(), None);
    }
}
