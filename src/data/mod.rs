//! Catalog dataset files.
//!
//! Layout: a 4 byte magic, a little-endian `u16` format version, then the
//! zstd-compressed bincode encoding of the [`StarCatalog`]. Indices are not
//! stored; they are rebuilt on load.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use bincode::ErrorKind;
use log::debug;
use thiserror::Error;

use crate::catalog::StarCatalog;

const DATASET_MAGIC: &[u8; 4] = b"SMRC";
const DATASET_VERSION: u16 = 1;
const HEADER_LEN: usize = DATASET_MAGIC.len() + 2;

/// zstd level for dataset payloads.
const CATALOG_COMPRESSION_LEVEL: i32 = 19;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] Box<ErrorKind>),
    #[error("Compression error: {0}")]
    Compression(#[source] std::io::Error),
    #[error("not a starmap dataset (bad header)")]
    BadHeader,
    #[error("unsupported dataset version {found}, expected {}", DATASET_VERSION)]
    Version { found: u16 },
}

pub fn serialize_catalog(catalog: &StarCatalog) -> Result<Vec<u8>, DataError> {
    let encoded = bincode::serialize(catalog)?;
    let payload = zstd::stream::encode_all(Cursor::new(encoded), CATALOG_COMPRESSION_LEVEL)
        .map_err(DataError::Compression)?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(DATASET_MAGIC);
    bytes.extend_from_slice(&DATASET_VERSION.to_le_bytes());
    bytes.extend_from_slice(&payload);
    debug!(
        "encoded {} systems into {} bytes",
        catalog.len(),
        bytes.len()
    );
    Ok(bytes)
}

/// Checks the header, decodes the catalog and rebuilds its name and spatial
/// indices.
pub fn deserialize_catalog(bytes: &[u8]) -> Result<StarCatalog, DataError> {
    if bytes.len() < HEADER_LEN || &bytes[..DATASET_MAGIC.len()] != DATASET_MAGIC {
        return Err(DataError::BadHeader);
    }
    let found = u16::from_le_bytes([bytes[4], bytes[5]]);
    if found != DATASET_VERSION {
        return Err(DataError::Version { found });
    }

    let decoded = zstd::stream::decode_all(Cursor::new(&bytes[HEADER_LEN..]))
        .map_err(DataError::Compression)?;
    let mut catalog: StarCatalog = bincode::deserialize(&decoded)?;
    catalog.rebuild_indices();
    Ok(catalog)
}

pub fn write_catalog_to_file<P: AsRef<Path>>(
    catalog: &StarCatalog,
    path: P,
) -> Result<(), DataError> {
    fs::write(path, serialize_catalog(catalog)?)?;
    Ok(())
}

pub fn read_catalog_from_file<P: AsRef<Path>>(path: P) -> Result<StarCatalog, DataError> {
    deserialize_catalog(&fs::read(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point3;
    use crate::System;

    fn sample() -> StarCatalog {
        StarCatalog::new(vec![
            System::new(1, "Sol", Point3::ORIGIN),
            System::new(2, "Barnard's Star", Point3::new(-3.03, 1.38, 4.94)),
        ])
    }

    #[test]
    fn catalog_file_restores_indices() {
        let catalog = sample();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("starmap.bin");

        write_catalog_to_file(&catalog, &path).expect("write");
        let restored = read_catalog_from_file(&path).expect("read");

        assert_eq!(restored.systems, catalog.systems);
        assert_eq!(restored.index_of_name("Barnard's Star"), Some(1));
        assert_eq!(restored.nearest(Point3::ORIGIN, 1.0, 3).len(), 1);
    }

    #[test]
    fn foreign_bytes_are_rejected_by_header() {
        let err = deserialize_catalog(b"not a catalog").unwrap_err();
        assert!(matches!(err, DataError::BadHeader));
        assert!(matches!(deserialize_catalog(b"SMR"), Err(DataError::BadHeader)));
    }

    #[test]
    fn newer_versions_are_refused() {
        let mut bytes = serialize_catalog(&sample()).expect("encode");
        bytes[4..6].copy_from_slice(&7u16.to_le_bytes());
        let err = deserialize_catalog(&bytes).unwrap_err();
        assert!(matches!(err, DataError::Version { found: 7 }));
    }

    #[test]
    fn corrupt_payload_is_a_compression_error() {
        let mut bytes = serialize_catalog(&sample()).expect("encode");
        bytes.truncate(HEADER_LEN);
        bytes.extend_from_slice(b"garbage");
        let err = deserialize_catalog(&bytes).unwrap_err();
        assert!(matches!(err, DataError::Compression(_)));
    }
}
