//! Sample dumps: decoded component planes on disk.
//!
//! A dump is a TOML descriptor next to a raw samples file:
//!
//! ```toml
//! samples = "scan.i32"
//!
//! [header]
//! width = 512
//! height = 512
//! tile_width = 256
//! tile_height = 256
//!
//! [[header.components]]
//! bit_depth = 12
//! ```
//!
//! The samples file holds one plane per component, in component order.
//! Each plane is row-major at component resolution and stores the raw
//! decode-chain integers (fraction bits included, no level shift) as
//! big-endian `i32`. An optional `[read]` table carries default read
//! parameters.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::chain::PlanarChain;
use crate::config::RegionRequest;
use crate::error::{ReaderError, Result};
use crate::geometry::ImageGeometry;
use crate::header::CodestreamHeader;
use crate::reader::TileReader;

/// Extension given to samples files written by [`SampleDump::save`].
pub const SAMPLES_EXTENSION: &str = "i32";

#[derive(Debug, Serialize, Deserialize)]
struct Descriptor {
    samples: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    read: Option<RegionRequest>,
    header: CodestreamHeader,
}

/// Component planes plus the header describing them.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleDump {
    /// Header of the dumped image.
    pub header: CodestreamHeader,
    /// One plane per component.
    pub planes: Vec<Vec<i32>>,
    /// Default read parameters, if the descriptor names any.
    pub read: Option<RegionRequest>,
}

fn plane_len(header: &CodestreamHeader) -> Result<usize> {
    let geometry = ImageGeometry::from_header(header)?;
    Ok(geometry.width() as usize * geometry.height() as usize)
}

impl SampleDump {
    /// Pair planes with their header, checking plane count and size.
    pub fn new(header: CodestreamHeader, planes: Vec<Vec<i32>>) -> Result<Self> {
        let expected = plane_len(&header)?;
        if planes.len() != header.num_components() {
            return Err(ReaderError::Descriptor(format!(
                "Header declares {} components, got {} planes",
                header.num_components(),
                planes.len()
            )));
        }
        if let Some((idx, plane)) = planes.iter().enumerate().find(|(_, p)| p.len() != expected) {
            return Err(ReaderError::Descriptor(format!(
                "Plane {} holds {} samples, expected {}",
                idx,
                plane.len(),
                expected
            )));
        }

        Ok(Self {
            header,
            planes,
            read: None,
        })
    }

    /// Attach default read parameters.
    pub fn with_read(mut self, request: RegionRequest) -> Self {
        self.read = Some(request);
        self
    }

    /// Load a dump from its descriptor.
    ///
    /// A relative samples path is resolved against the descriptor's
    /// directory.
    pub fn load(descriptor: &Path) -> Result<Self> {
        let text = fs::read_to_string(descriptor)?;
        let parsed: Descriptor = toml::from_str(&text)?;

        let samples = match descriptor.parent() {
            Some(dir) if parsed.samples.is_relative() => dir.join(&parsed.samples),
            _ => parsed.samples.clone(),
        };
        let len = plane_len(&parsed.header)?;
        let count = parsed.header.num_components();
        debug!(
            "Loading {} planes of {} samples from {}",
            count,
            len,
            samples.display()
        );

        let mut reader = BufReader::new(File::open(&samples)?);
        let mut planes = Vec::with_capacity(count);
        for component in 0..count {
            let mut plane = vec![0i32; len];
            reader
                .read_i32_into::<BigEndian>(&mut plane)
                .map_err(|e| match e.kind() {
                    ErrorKind::UnexpectedEof => ReaderError::Descriptor(format!(
                        "Samples file {} ends inside plane {}",
                        samples.display(),
                        component
                    )),
                    _ => ReaderError::Io(e),
                })?;
            planes.push(plane);
        }

        let mut rest = [0u8; 1];
        if reader.read(&mut rest)? != 0 {
            return Err(ReaderError::Descriptor(format!(
                "Samples file {} is longer than {} planes of {} samples",
                samples.display(),
                count,
                len
            )));
        }

        Ok(Self {
            header: parsed.header,
            planes,
            read: parsed.read,
        })
    }

    /// Write the descriptor and a samples file beside it.
    ///
    /// The samples file takes the descriptor's name with the
    /// [`SAMPLES_EXTENSION`] extension. Returns its path.
    pub fn save(&self, descriptor: &Path) -> Result<PathBuf> {
        let samples = descriptor.with_extension(SAMPLES_EXTENSION);
        let name = samples
            .file_name()
            .map(PathBuf::from)
            .ok_or_else(|| {
                ReaderError::Descriptor(format!("Invalid descriptor path {}", descriptor.display()))
            })?;

        let mut out = BufWriter::new(File::create(&samples)?);
        for plane in &self.planes {
            for &value in plane {
                out.write_i32::<BigEndian>(value)?;
            }
        }
        out.flush()?;

        let text = toml::to_string(&Descriptor {
            samples: name,
            read: self.read.clone(),
            header: self.header.clone(),
        })?;
        fs::write(descriptor, text)?;

        info!(
            "Wrote {} planes to {}",
            self.planes.len(),
            descriptor.display()
        );
        Ok(samples)
    }

    /// In-memory decode chain over the planes.
    pub fn into_chain(self) -> Result<PlanarChain> {
        PlanarChain::new(&self.header, self.planes)
    }

    /// Open a reader session over the dump.
    pub fn open(self) -> Result<TileReader<PlanarChain>> {
        let header = self.header.clone();
        TileReader::new(header, self.into_chain()?)
    }
}
