/// On-store grid blobs: a bincode encoded `Grid`, compressed as configured.
use crate::types::Grid;
use serde::Deserialize;
use std::io::{self, Read};

#[derive(thiserror::Error, Debug)]
pub enum GridFormatError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum Compression {
    None,
    #[default]
    Zlib,
    // zstd with compression level, only used when writing
    Zstd {
        #[serde(default = "default_zstd_level")]
        level: i32,
    },
}

fn default_zstd_level() -> i32 {
    1
}

#[derive(Clone)]
pub struct GridCodec {
    compression: Compression,
    config: bincode::config::Configuration,
}

impl GridCodec {
    pub fn new(compression: Compression) -> Self {
        GridCodec {
            compression,
            // standard defaults to little-endian + varint
            config: bincode::config::standard(),
        }
    }

    pub fn read<R: Read>(&self, reader: R) -> Result<Grid, GridFormatError> {
        match self.compression {
            Compression::None => self.decode_from(reader),
            Compression::Zlib => self.decode_from(flate2::read::ZlibDecoder::new(reader)),
            Compression::Zstd { .. } => self.decode_from(zstd::stream::read::Decoder::new(reader)?),
        }
    }

    fn decode_from<R: Read>(&self, mut reader: R) -> Result<Grid, GridFormatError> {
        let grid: Grid = bincode::decode_from_std_read(&mut reader, self.config)?;
        Ok(grid)
    }

    #[cfg(test)]
    pub fn write<W: io::Write>(&self, writer: &mut W, grid: &Grid) -> Result<usize, GridFormatError> {
        match self.compression {
            Compression::None => {
                let size = bincode::encode_into_std_write(grid, writer, self.config)?;
                writer.flush()?;
                Ok(size)
            }
            Compression::Zlib => {
                let mut encoder =
                    flate2::write::ZlibEncoder::new(writer, flate2::Compression::default());
                let size = bincode::encode_into_std_write(grid, &mut encoder, self.config)?;
                encoder.finish()?;
                Ok(size)
            }
            Compression::Zstd { level } => {
                let mut encoder = zstd::stream::write::Encoder::new(writer, level)?;
                let size = bincode::encode_into_std_write(grid, &mut encoder, self.config)?;
                encoder.finish()?;
                Ok(size)
            }
        }
    }

    #[cfg(test)]
    pub fn to_bytes(&self, grid: &Grid) -> bytes::Bytes {
        let mut buffer = Vec::new();
        self.write(&mut buffer, grid).unwrap();
        bytes::Bytes::from(buffer)
    }
}
