//! Memory regions
//!
//! Each region owns a zeroed buffer of its full capacity and a write
//! pointer in `[0, capacity]`. A write that does not fit fails before any
//! byte is committed. A slot may instead hold a reference to a region
//! exported by another image, which has no buffer at all.

use crate::error::{Result, RuntimeError};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct MemoryRegion {
    id: u32,
    data: Vec<u8>,
    write_pointer: u32,
    /// Reserved as never to be written
    empty: bool,
    written: bool,
    /// Identifier other images use to reference this region
    reference: Option<u32>,
}

impl MemoryRegion {
    pub fn new(id: u32, capacity: u32, empty: bool) -> Self {
        Self {
            id,
            data: vec![0; capacity as usize],
            write_pointer: 0,
            empty: empty || capacity == 0,
            written: false,
            reference: None,
        }
    }

    pub fn referenceable(mut self, reference: Option<u32>) -> Self {
        self.reference = reference;
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn capacity(&self) -> u32 {
        self.data.len() as u32
    }

    pub fn write_pointer(&self) -> u32 {
        self.write_pointer
    }

    pub fn remaining(&self) -> u32 {
        self.capacity() - self.write_pointer
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Reserved with the empty flag or with no capacity
    pub fn is_empty_flagged(&self) -> bool {
        self.empty
    }

    pub fn is_written(&self) -> bool {
        self.written
    }

    pub fn reference(&self) -> Option<u32> {
        self.reference
    }

    /// Never written, and not deliberately left empty
    pub fn is_missing_data(&self) -> bool {
        !self.empty && !self.written
    }

    /// Excluded from the finished image
    ///
    /// Referenceable regions are always laid out, since other images
    /// point into them.
    pub fn is_unfilled(&self) -> bool {
        self.reference.is_none() && (self.empty || !self.written)
    }

    fn exhausted(&self, required: u64) -> RuntimeError {
        RuntimeError::RegionExhausted {
            region: self.id,
            capacity: self.capacity(),
            required,
        }
    }

    /// Write bytes at the write pointer and advance it
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_repeated(bytes, 1)
    }

    /// Write `bytes` back to back `repeats` times
    pub fn write_repeated(&mut self, bytes: &[u8], repeats: u64) -> Result<()> {
        if self.empty {
            return Err(RuntimeError::RegionUnfilled(self.id));
        }
        let total = (bytes.len() as u64).saturating_mul(repeats);
        let required = (self.write_pointer as u64).saturating_add(total);
        if required > self.capacity() as u64 {
            return Err(self.exhausted(required));
        }

        let mut at = self.write_pointer as usize;
        for _ in 0..repeats {
            self.data[at..at + bytes.len()].copy_from_slice(bytes);
            at += bytes.len();
        }
        self.write_pointer = required as u32;
        self.written = true;
        Ok(())
    }

    /// Move the write pointer to `pointer`
    pub fn set_write_pointer(&mut self, pointer: i64) -> Result<()> {
        if pointer < 0 || pointer > self.capacity() as i64 {
            return Err(RuntimeError::WritePointerOutOfBounds {
                region: self.id,
                pointer,
                capacity: self.capacity(),
            });
        }
        self.write_pointer = pointer as u32;
        Ok(())
    }

    /// Round the write pointer up to a multiple of `boundary`, zero-filling the gap
    pub fn align(&mut self, boundary: i64) -> Result<()> {
        if boundary <= 0 || (boundary as u64).count_ones() != 1 {
            return Err(RuntimeError::InvalidAlignment(boundary));
        }
        let boundary = boundary as u64;
        let from = self.write_pointer as u64;
        let target = from.div_ceil(boundary) * boundary;
        if target > self.capacity() as u64 {
            return Err(self.exhausted(target));
        }
        self.data[from as usize..target as usize].fill(0);
        self.write_pointer = target as u32;
        Ok(())
    }
}

/// Fixed table of region slots
#[derive(Debug, Clone)]
pub struct MemoryRegions {
    slots: Vec<Option<MemoryRegion>>,
    /// Slots standing in for another image's region, by reference id
    references: BTreeMap<u32, u32>,
    focus: Option<u32>,
    max_region_bytes: u32,
}

impl MemoryRegions {
    pub fn new(max_regions: u32, max_region_bytes: u32) -> Self {
        Self {
            slots: vec![None; max_regions as usize],
            references: BTreeMap::new(),
            focus: None,
            max_region_bytes,
        }
    }

    pub fn max_regions(&self) -> u32 {
        self.slots.len() as u32
    }

    fn slot(&self, id: u32) -> Result<&Option<MemoryRegion>> {
        self.slots.get(id as usize).ok_or(RuntimeError::ParameterOutOfBounds {
            what: "region",
            value: id as i64,
            max: self.max_regions(),
        })
    }

    fn check_free_slot(&self, id: u32) -> Result<()> {
        if self.slot(id)?.is_some() || self.references.contains_key(&id) {
            return Err(RuntimeError::RegionInUse(id));
        }
        Ok(())
    }

    fn missing(&self, id: u32) -> RuntimeError {
        if self.references.contains_key(&id) {
            RuntimeError::ReferenceRegion(id)
        } else {
            RuntimeError::NotAllocated(id)
        }
    }

    /// Reserve a region, optionally exporting it under `reference`
    pub fn reserve(&mut self, id: u32, size: u32, empty: bool, reference: Option<u32>) -> Result<()> {
        self.check_free_slot(id)?;
        if size > self.max_region_bytes {
            return Err(RuntimeError::RegionTooLarge {
                region: id,
                size,
                max: self.max_region_bytes,
            });
        }
        if let Some(exported) = reference {
            if self.iter().any(|r| r.reference() == Some(exported)) {
                return Err(RuntimeError::DuplicateReference(exported));
            }
        }
        self.slots[id as usize] = Some(MemoryRegion::new(id, size, empty).referenceable(reference));
        Ok(())
    }

    /// Bind slot `id` to a region another image exports as `reference`
    pub fn reference(&mut self, id: u32, reference: u32) -> Result<()> {
        self.check_free_slot(id)?;
        self.references.insert(id, reference);
        Ok(())
    }

    /// Release a reserved region or a reference slot
    pub fn free(&mut self, id: u32) -> Result<()> {
        self.slot(id)?;
        if self.references.remove(&id).is_none() {
            self.slots[id as usize].take().ok_or(RuntimeError::NotAllocated(id))?;
        }
        if self.focus == Some(id) {
            self.focus = None;
        }
        Ok(())
    }

    pub fn get(&self, id: u32) -> Result<&MemoryRegion> {
        self.slot(id)?.as_ref().ok_or_else(|| self.missing(id))
    }

    pub fn get_mut(&mut self, id: u32) -> Result<&mut MemoryRegion> {
        self.slot(id)?;
        let err = self.missing(id);
        self.slots[id as usize].as_mut().ok_or(err)
    }

    /// Direct unaddressed writes at region `id`
    pub fn switch_focus(&mut self, id: u32) -> Result<()> {
        if self.get(id)?.is_empty_flagged() {
            return Err(RuntimeError::RegionUnfilled(id));
        }
        self.focus = Some(id);
        Ok(())
    }

    pub fn focus(&self) -> Option<u32> {
        self.focus
    }

    pub fn focused(&self) -> Result<&MemoryRegion> {
        let id = self.focus.ok_or(RuntimeError::NoRegionSelected)?;
        self.get(id)
    }

    pub fn focused_mut(&mut self) -> Result<&mut MemoryRegion> {
        let id = self.focus.ok_or(RuntimeError::NoRegionSelected)?;
        self.get_mut(id)
    }

    /// Number of occupied slots, references included
    pub fn used_count(&self) -> usize {
        self.slots.iter().flatten().count() + self.references.len()
    }

    /// Reserved regions in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &MemoryRegion> {
        self.slots.iter().flatten()
    }

    /// `(region, reference)` for every reference slot, ascending region id
    pub fn references(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.references.iter().map(|(region, reference)| (*region, *reference))
    }
}
