//! Archive naming conventions and extraction.

use std::io::{BufRead, BufReader, Read};

use camino::Utf8Path;
use flate2::read::GzDecoder;
use tar::Archive;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Extensions stripped from object names, checked in this order.
const ARCHIVE_EXTENSIONS: [&str; 3] = [".tar", ".tar.gz", ".tgz"];

/// Content id encoded in a build filename: everything before the first `.`.
#[must_use]
pub fn content_id(file_name: &str) -> &str {
    file_name
        .split_once('.')
        .map_or(file_name, |(head, _)| head)
}

/// Final path component of an object key.
#[must_use]
pub fn base_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Name of the extracted bundle for an object basename.
///
/// `abc.app.tar.gz` becomes `abc.app`. Names without a known archive
/// extension are returned unchanged.
#[must_use]
pub fn strip_archive_extension(file_name: &str) -> &str {
    ARCHIVE_EXTENSIONS
        .iter()
        .find_map(|extension| file_name.strip_suffix(extension))
        .unwrap_or(file_name)
}

/// Unpacks a tar stream into `destination`, transparently decompressing
/// gzip input.
///
/// # Errors
///
/// Returns the underlying I/O error when the stream cannot be read or an
/// entry cannot be written.
pub fn unpack(reader: impl Read, destination: &Utf8Path) -> std::io::Result<()> {
    let mut buffered = BufReader::new(reader);
    let gzipped = buffered.fill_buf()?.starts_with(&GZIP_MAGIC);
    if gzipped {
        Archive::new(GzDecoder::new(buffered)).unpack(destination)
    } else {
        Archive::new(buffered).unpack(destination)
    }
}
