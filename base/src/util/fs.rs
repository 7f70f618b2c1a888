use std::fs::{read, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::defs::{IntoResult, Result};

pub fn open_file<P: AsRef<Path>>(path: P) -> Result<File> {
    let path = path.as_ref();
    File::open(path).res(|| {
        format!("failed to open file '{}'", path.display())
    })
}

pub fn create_file<P: AsRef<Path>>(path: P) -> Result<File> {
    let path = path.as_ref();
    File::create(path).res(|| {
        format!("failed to create file '{}'", path.display())
    })
}

pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let path = path.as_ref();
    read(path).res(|| {
        format!("failed to read file '{}'", path.display())
    })
}

/// Writes a value as gzip-compressed JSON. Used for intermediate
/// pipeline artifacts that should stay small but inspectable.
pub fn write_json_gz<P: AsRef<Path>, T: Serialize>(
    path: P,
    value: &T,
) -> Result<()> {
    let path = path.as_ref();
    let file = create_file(path)?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    serde_json::to_writer(encoder, value).res(|| {
        format!("failed to write file '{}'", path.display())
    })
}

pub fn read_json_gz<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> Result<T> {
    let path = path.as_ref();
    let file = open_file(path)?;
    let decoder = GzDecoder::new(BufReader::new(file));
    serde_json::from_reader(decoder).res(|| {
        format!("failed to parse file '{}'", path.display())
    })
}
