// src/compression.rs

//! Single-file decompression used by the unpacker.
//!
//! Archive extraction proper (`.tar.*`, `.zip`) shells out to the system
//! tools; this module handles the bare compressed-file case (`hello.gz`
//! next to a tarball, a compressed patch, and so on) for the formats the
//! engine can decode in process. `.bz2` is the one suffix left to an
//! external tool.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Compression formats decodable in process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    Gzip,
    Xz,
    Zstd,
}

impl CompressionFormat {
    /// Detect a single-file compression format from a filename suffix.
    pub fn from_extension(name: &str) -> Option<Self> {
        if name.ends_with(".gz") {
            Some(Self::Gzip)
        } else if name.ends_with(".xz") {
            Some(Self::Xz)
        } else if name.ends_with(".zst") {
            Some(Self::Zstd)
        } else {
            None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
        }
    }
}

/// Create a decompressing reader for the given format.
pub fn create_decoder<'a, R: Read + 'a>(
    reader: R,
    format: CompressionFormat,
) -> Result<Box<dyn Read + 'a>> {
    match format {
        CompressionFormat::Gzip => Ok(Box::new(flate2::read::GzDecoder::new(reader))),
        CompressionFormat::Xz => Ok(Box::new(xz2::read::XzDecoder::new(reader))),
        CompressionFormat::Zstd => {
            let decoder = zstd::Decoder::new(reader)
                .map_err(|e| Error::Unpack(format!("failed to create zstd decoder: {e}")))?;
            Ok(Box::new(decoder))
        }
    }
}

/// Decompress `src` into `dest` with the format implied by `src`'s suffix.
pub fn decompress_file(src: &Path, dest: &Path, format: CompressionFormat) -> Result<()> {
    let input = File::open(src)?;
    let mut decoder = create_decoder(input, format)?;
    let mut output = File::create(dest)?;
    io::copy(&mut decoder, &mut output).map_err(|e| {
        Error::Unpack(format!(
            "{} decompression of {} failed: {e}",
            format.name(),
            src.display()
        ))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            CompressionFormat::from_extension("file.gz"),
            Some(CompressionFormat::Gzip)
        );
        assert_eq!(
            CompressionFormat::from_extension("file.xz"),
            Some(CompressionFormat::Xz)
        );
        assert_eq!(
            CompressionFormat::from_extension("file.zst"),
            Some(CompressionFormat::Zstd)
        );
        assert_eq!(CompressionFormat::from_extension("file.txt"), None);
    }

    #[test]
    fn test_gzip_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("data.gz");
        let dest = dir.path().join("data");

        let mut encoder =
            flate2::write::GzEncoder::new(File::create(&src).unwrap(), flate2::Compression::fast());
        encoder.write_all(b"some payload").unwrap();
        encoder.finish().unwrap();

        decompress_file(&src, &dest, CompressionFormat::Gzip).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"some payload");
    }

    #[test]
    fn test_zstd_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("data.zst");
        let dest = dir.path().join("data");

        std::fs::write(&src, zstd::encode_all(&b"zstd payload"[..], 3).unwrap()).unwrap();

        decompress_file(&src, &dest, CompressionFormat::Zstd).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"zstd payload");
    }
}
