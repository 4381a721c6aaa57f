//! # Finished Memory Image
//!
//! The artifact an execution produces: a header, a pointer table with one
//! entry per laid-out region or reference, then the region payloads.
//!
//! Binary format (all fields little-endian u32):
//! ```text
//! Offset  Size      Field
//! ──────────────────────────────────────────
//! 0x00    4         magic (0xAD130AD6)
//! 0x04    4         version (0x00010000)
//! 0x08    4         entry count N
//! 0x0C    24 * N    entries { region, kind, reference, offset, size, checksum }
//! ...     ...       payloads, ascending region id
//! ```
//!
//! Entry offsets are relative to the start of the payload area. Reference
//! entries stand for memory owned by another image and carry no payload.

use crate::error::{Result, SpecError};
use sha2::{Digest, Sha256};
use std::fmt;

/// Magic number identifying a data specification image
pub const MAGIC: u32 = 0xAD13_0AD6;

/// Image format version: v1.0 = 0x00010000
pub const VERSION: u32 = 0x0001_0000;

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Wrapping sum of the data read as little-endian words, zero-padded
pub fn checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_le_bytes(word))
    })
}

// ============================================================================
// Header
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageHeader {
    pub magic: u32,
    pub version: u32,
    /// Number of pointer table entries
    pub region_count: u32,
}

impl ImageHeader {
    /// Header size in bytes
    pub const SIZE: usize = 12;

    pub fn new(region_count: u32) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            region_count,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.magic != MAGIC {
            return Err(SpecError::InvalidMagic(self.magic));
        }
        if self.version != VERSION {
            return Err(SpecError::InvalidVersion {
                expected: VERSION,
                found: self.version,
            });
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.magic.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.region_count.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(SpecError::InvalidHeaderSize {
                expected: Self::SIZE,
                found: bytes.len(),
            });
        }

        let header = Self {
            magic: read_u32(bytes, 0),
            version: read_u32(bytes, 4),
            region_count: read_u32(bytes, 8),
        };

        header.validate()?;
        Ok(header)
    }
}

// ============================================================================
// Pointer table
// ============================================================================

/// How a pointer table entry relates to other images
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegionKind {
    /// Plain region owned by this image
    Data,
    /// Owned by this image and exported under an identifier
    Referenceable(u32),
    /// Stands for a referenceable region of another image
    Reference(u32),
}

impl RegionKind {
    fn to_words(self) -> (u32, u32) {
        match self {
            RegionKind::Data => (0, 0),
            RegionKind::Referenceable(id) => (1, id),
            RegionKind::Reference(id) => (2, id),
        }
    }

    fn from_words(kind: u32, reference: u32) -> Option<Self> {
        match kind {
            0 => Some(RegionKind::Data),
            1 => Some(RegionKind::Referenceable(reference)),
            2 => Some(RegionKind::Reference(reference)),
            _ => None,
        }
    }

    pub fn reference(self) -> Option<u32> {
        match self {
            RegionKind::Data => None,
            RegionKind::Referenceable(id) | RegionKind::Reference(id) => Some(id),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PointerTableEntry {
    pub region: u32,
    pub kind: RegionKind,
    /// Offset from the start of the payload area
    pub offset: u32,
    /// Payload size in bytes
    pub size: u32,
    pub checksum: u32,
}

impl PointerTableEntry {
    /// Entry size in bytes
    pub const SIZE: usize = 24;

    /// Entry has no payload of its own
    pub fn is_reference(&self) -> bool {
        matches!(self.kind, RegionKind::Reference(_))
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let (kind, reference) = self.kind.to_words();
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.region.to_le_bytes());
        bytes[4..8].copy_from_slice(&kind.to_le_bytes());
        bytes[8..12].copy_from_slice(&reference.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.offset.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.size.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let region = read_u32(bytes, 0);
        let kind = read_u32(bytes, 4);
        let kind = RegionKind::from_words(kind, read_u32(bytes, 8))
            .ok_or(SpecError::InvalidEntryKind { region, kind })?;
        Ok(Self {
            region,
            kind,
            offset: read_u32(bytes, 12),
            size: read_u32(bytes, 16),
            checksum: read_u32(bytes, 20),
        })
    }
}

// ============================================================================
// Image
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataImage {
    pub header: ImageHeader,
    pub entries: Vec<PointerTableEntry>,
    pub payload: Vec<u8>,
}

impl DataImage {
    /// Lay out plain filled regions in ascending id order
    pub fn from_regions(regions: Vec<(u32, Vec<u8>)>) -> Result<Self> {
        Self::from_parts(
            regions
                .into_iter()
                .map(|(region, data)| (region, RegionKind::Data, data))
                .collect(),
        )
    }

    /// Lay out regions of any kind in ascending id order
    ///
    /// Data passed with a [`RegionKind::Reference`] entry is ignored.
    pub fn from_parts(mut regions: Vec<(u32, RegionKind, Vec<u8>)>) -> Result<Self> {
        regions.sort_by_key(|(id, _, _)| *id);

        let mut entries = Vec::with_capacity(regions.len());
        let mut payload = Vec::new();
        for (region, kind, data) in regions {
            if let RegionKind::Reference(_) = kind {
                entries.push(PointerTableEntry {
                    region,
                    kind,
                    offset: 0,
                    size: 0,
                    checksum: 0,
                });
                continue;
            }
            let offset = u32::try_from(payload.len()).map_err(|_| SpecError::InvalidImageSize {
                expected: u32::MAX as usize,
                found: payload.len(),
            })?;
            let size = u32::try_from(data.len()).map_err(|_| SpecError::InvalidImageSize {
                expected: u32::MAX as usize,
                found: data.len(),
            })?;
            entries.push(PointerTableEntry {
                region,
                kind,
                offset,
                size,
                checksum: checksum(&data),
            });
            payload.extend_from_slice(&data);
        }

        Ok(Self {
            header: ImageHeader::new(entries.len() as u32),
            entries,
            payload,
        })
    }

    /// Byte offset of the payload area from the image start
    pub fn payload_offset(&self) -> usize {
        ImageHeader::SIZE + self.entries.len() * PointerTableEntry::SIZE
    }

    /// Offset of an entry's payload from the image start
    pub fn absolute_offset(&self, entry: &PointerTableEntry) -> usize {
        self.payload_offset() + entry.offset as usize
    }

    pub fn total_size(&self) -> usize {
        self.payload_offset() + self.payload.len()
    }

    pub fn entry(&self, region: u32) -> Option<&PointerTableEntry> {
        self.entries.iter().find(|e| e.region == region)
    }

    /// Payload bytes of a region, if it is in the table and owned here
    pub fn region_data(&self, region: u32) -> Option<&[u8]> {
        let entry = self.entry(region)?;
        if entry.is_reference() {
            return None;
        }
        let start = entry.offset as usize;
        self.payload.get(start..start.checked_add(entry.size as usize)?)
    }

    /// `(region, identifier)` of every region this image exports
    pub fn referenceable_regions(&self) -> Vec<(u32, u32)> {
        self.entries
            .iter()
            .filter_map(|e| match e.kind {
                RegionKind::Referenceable(id) => Some((e.region, id)),
                _ => None,
            })
            .collect()
    }

    /// `(region, identifier)` of every reference a loader must resolve
    pub fn references_to_fill(&self) -> Vec<(u32, u32)> {
        self.entries
            .iter()
            .filter_map(|e| match e.kind {
                RegionKind::Reference(id) => Some((e.region, id)),
                _ => None,
            })
            .collect()
    }

    /// Check every entry lies in the payload and matches its checksum
    pub fn verify(&self) -> Result<()> {
        for entry in self.entries.iter().filter(|e| !e.is_reference()) {
            let data = self
                .region_data(entry.region)
                .ok_or(SpecError::EntryOutOfBounds { region: entry.region })?;
            let found = checksum(data);
            if found != entry.checksum {
                return Err(SpecError::ChecksumMismatch {
                    region: entry.region,
                    expected: entry.checksum,
                    found,
                });
            }
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.total_size());
        bytes.extend_from_slice(&self.header.to_bytes());
        for entry in &self.entries {
            bytes.extend_from_slice(&entry.to_bytes());
        }
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Parse and verify an image
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header = ImageHeader::from_bytes(bytes)?;

        let table_end = (header.region_count as usize)
            .checked_mul(PointerTableEntry::SIZE)
            .and_then(|len| len.checked_add(ImageHeader::SIZE))
            .ok_or(SpecError::InvalidImageSize {
                expected: usize::MAX,
                found: bytes.len(),
            })?;
        if bytes.len() < table_end {
            return Err(SpecError::InvalidImageSize {
                expected: table_end,
                found: bytes.len(),
            });
        }

        let entries = bytes[ImageHeader::SIZE..table_end]
            .chunks_exact(PointerTableEntry::SIZE)
            .map(PointerTableEntry::from_bytes)
            .collect::<Result<Vec<_>>>()?;

        let image = Self {
            header,
            entries,
            payload: bytes[table_end..].to_vec(),
        };
        image.verify()?;
        Ok(image)
    }

    /// SHA-256 of the serialized image
    pub fn digest(&self) -> [u8; 32] {
        Sha256::digest(self.to_bytes()).into()
    }
}

impl fmt::Display for DataImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Data Specification Image")?;
        writeln!(f, "  Magic:       {:#010x}", self.header.magic)?;
        writeln!(f, "  Version:     {:#010x}", self.header.version)?;
        writeln!(f, "  Regions:     {}", self.header.region_count)?;
        for entry in &self.entries {
            match entry.kind {
                RegionKind::Reference(id) => writeln!(f, "  [{:2}] reference {}", entry.region, id)?,
                kind => {
                    write!(
                        f,
                        "  [{:2}] offset={:#06x} size={} checksum={:#010x}",
                        entry.region, entry.offset, entry.size, entry.checksum
                    )?;
                    match kind.reference() {
                        Some(id) => writeln!(f, " exported as {}", id)?,
                        None => writeln!(f)?,
                    }
                }
            }
        }
        write!(f, "  Total size:  {} bytes", self.total_size())
    }
}
