//! In-memory zip archive builders.

use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

enum Entry {
    File { name: String, data: Vec<u8> },
    Dir { name: String },
    Symlink { name: String, target: String },
}

/// Fluent builder for zip archives. Entry names are written verbatim, so
/// hostile names (`../x`, `/abs`, `C:x`) can be produced on purpose.
///
/// # Example
///
/// ```ignore
/// let bytes = ZipBuilder::new()
///     .dir("App/")
///     .file("App/app.exe", vec![0; 1024])
///     .build();
/// ```
#[derive(Default)]
pub struct ZipBuilder {
    entries: Vec<Entry>,
}

impl ZipBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn file(mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.entries.push(Entry::File {
            name: name.into(),
            data: data.into(),
        });
        self
    }

    /// A file of `size` filler bytes.
    #[must_use]
    pub fn sized_file(self, name: impl Into<String>, size: usize) -> Self {
        self.file(name, vec![b'x'; size])
    }

    #[must_use]
    pub fn dir(mut self, name: impl Into<String>) -> Self {
        self.entries.push(Entry::Dir { name: name.into() });
        self
    }

    #[must_use]
    pub fn symlink(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.entries.push(Entry::Symlink {
            name: name.into(),
            target: target.into(),
        });
        self
    }

    /// Serialize the archive.
    ///
    /// # Panics
    ///
    /// Panics if the zip writer rejects an entry.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o755);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for entry in self.entries {
            match entry {
                Entry::File { name, data } => {
                    writer.start_file(name, options).expect("start zip entry");
                    writer.write_all(&data).expect("write zip entry");
                }
                Entry::Dir { name } => {
                    writer.add_directory(name, options).expect("add zip directory");
                }
                Entry::Symlink { name, target } => {
                    writer
                        .add_symlink(name, target, options)
                        .expect("add zip symlink");
                }
            }
        }
        writer.finish().expect("finish zip archive").into_inner()
    }
}

/// The reference archive: one wrapper directory holding the main program, an
/// uninstaller and a nested helper.
///
/// ```text
/// TestSoft/TestSoft.exe        2048 bytes
/// TestSoft/uninstall.exe        512 bytes
/// TestSoft/data/helper.exe      256 bytes
/// ```
#[must_use]
pub fn test_soft_archive() -> Vec<u8> {
    ZipBuilder::new()
        .dir("TestSoft/")
        .sized_file("TestSoft/TestSoft.exe", 2048)
        .sized_file("TestSoft/uninstall.exe", 512)
        .dir("TestSoft/data/")
        .sized_file("TestSoft/data/helper.exe", 256)
        .build()
}

const EOCD_SIGNATURE: [u8; 4] = *b"PK\x05\x06";
const CENTRAL_SIGNATURE: [u8; 4] = *b"PK\x01\x02";

fn read_u16(bytes: &[u8], at: usize) -> usize {
    let raw: [u8; 2] = bytes.get(at..at + 2).expect("zip field").try_into().unwrap();
    usize::from(u16::from_le_bytes(raw))
}

fn read_u32(bytes: &[u8], at: usize) -> usize {
    let raw: [u8; 4] = bytes.get(at..at + 4).expect("zip field").try_into().unwrap();
    usize::try_from(u32::from_le_bytes(raw)).unwrap()
}

fn write_u32(bytes: &mut [u8], at: usize, value: u32) {
    bytes
        .get_mut(at..at + 4)
        .expect("zip field")
        .copy_from_slice(&value.to_le_bytes());
}

/// Rewrite every entry's uncompressed size, in both the central directory and
/// the local headers, to `claimed`. The compressed data is left alone, so the
/// entries inflate to more than their headers admit.
#[must_use]
pub fn understate_uncompressed_sizes(mut archive: Vec<u8>, claimed: u32) -> Vec<u8> {
    let eocd = archive
        .windows(4)
        .rposition(|window| window == EOCD_SIGNATURE)
        .expect("end of central directory");
    let entries = read_u16(&archive, eocd + 10);
    let mut cursor = read_u32(&archive, eocd + 16);
    for _ in 0..entries {
        assert_eq!(
            archive.get(cursor..cursor + 4),
            Some(&CENTRAL_SIGNATURE[..]),
            "central directory header"
        );
        let name_len = read_u16(&archive, cursor + 28);
        let extra_len = read_u16(&archive, cursor + 30);
        let comment_len = read_u16(&archive, cursor + 32);
        let local = read_u32(&archive, cursor + 42);
        write_u32(&mut archive, cursor + 24, claimed);
        write_u32(&mut archive, local + 22, claimed);
        cursor += 46 + name_len + extra_len + comment_len;
    }
    archive
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_soft_archive_lists_expected_entries() {
        let archive = zip::ZipArchive::new(Cursor::new(test_soft_archive())).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort_unstable();
        assert_eq!(
            names,
            vec![
                "TestSoft/",
                "TestSoft/TestSoft.exe",
                "TestSoft/data/",
                "TestSoft/data/helper.exe",
                "TestSoft/uninstall.exe",
            ]
        );
    }

    #[test]
    fn understated_sizes_are_what_the_reader_sees() {
        let bytes = ZipBuilder::new().sized_file("big.bin", 4096).build();
        let mut archive =
            zip::ZipArchive::new(Cursor::new(understate_uncompressed_sizes(bytes, 10))).unwrap();
        assert_eq!(archive.by_index(0).unwrap().size(), 10);
    }
}
