use crate::error::SurveyError;
use std::fs::File;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::path::Path;

/// A reader over workbook bytes that either live in a local file or were
/// handed over in memory (uploads, tests).
pub(crate) enum SourceReader {
    /// Local file reader
    Local(BufReader<File>),
    /// In-memory buffer
    Memory(Cursor<Vec<u8>>),
}

impl SourceReader {
    /// Opens a local workbook file.
    pub(crate) fn open(path: &Path) -> Result<SourceReader, SurveyError> {
        let file = File::open(path)?;
        Ok(SourceReader::Local(BufReader::new(file)))
    }

    /// Wraps workbook bytes already held in memory.
    pub(crate) fn from_bytes(bytes: Vec<u8>) -> SourceReader {
        SourceReader::Memory(Cursor::new(bytes))
    }
}

impl Read for SourceReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            SourceReader::Local(reader) => reader.read(buf),
            SourceReader::Memory(reader) => reader.read(buf),
        }
    }
}

impl Seek for SourceReader {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        match self {
            SourceReader::Local(reader) => reader.seek(pos),
            SourceReader::Memory(reader) => reader.seek(pos),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_local_file() {
        // Cargo.toml always exists at the crate root while testing
        let result = SourceReader::open(Path::new("Cargo.toml"));
        assert!(result.is_ok(), "Failed to open local file: {:?}", result.err());

        let result = SourceReader::open(Path::new("non_existent_file.xlsx"));
        assert!(result.is_err(), "Should fail to open non-existent file");
    }

    #[test]
    fn test_memory_reader_reads_and_seeks() {
        let mut reader = SourceReader::from_bytes(b"PK\x03\x04rest".to_vec());
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).unwrap();
        assert_eq!(&magic, b"PK\x03\x04");

        reader.seek(std::io::SeekFrom::Start(0)).unwrap();
        let mut all = Vec::new();
        reader.read_to_end(&mut all).unwrap();
        assert_eq!(all.len(), 8);
    }
}
