//! Structure table
//!
//! A structure is an ordered list of typed elements, each holding an
//! optional raw value. Definitions arrive one element at a time between
//! start and end commands; the table keeps the definition being built
//! apart from the committed ones.

use crate::error::{Result, RuntimeError};
use dataspec_spec::DataType;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element {
    pub data_type: DataType,
    /// Raw (scaled) value, `None` until set
    pub value: Option<i128>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Structure {
    pub elements: Vec<Element>,
}

impl Structure {
    /// Serialized size in bytes; elements are packed without padding
    pub fn size(&self) -> usize {
        self.elements.iter().map(|e| e.data_type.size()).sum()
    }
}

#[derive(Debug, Clone)]
pub struct StructureTable {
    slots: Vec<Option<Structure>>,
    max_elements: u32,
    defining: Option<(u32, Structure)>,
}

impl StructureTable {
    pub fn new(max_structs: u32, max_elements: u32) -> Self {
        Self {
            slots: vec![None; max_structs as usize],
            max_elements,
            defining: None,
        }
    }

    fn check_id(&self, id: u32) -> Result<()> {
        if id as usize >= self.slots.len() {
            return Err(RuntimeError::ParameterOutOfBounds {
                what: "structure",
                value: id as i64,
                max: self.slots.len() as u32,
            });
        }
        Ok(())
    }

    pub fn is_defining(&self) -> bool {
        self.defining.is_some()
    }

    pub fn start(&mut self, id: u32) -> Result<()> {
        self.check_id(id)?;
        if self.defining.is_some() {
            return Err(RuntimeError::StructureOpen);
        }
        self.defining = Some((id, Structure::default()));
        Ok(())
    }

    /// Append the next element of the open definition
    pub fn element(&mut self, index: u32, data_type: DataType, value: Option<i128>) -> Result<()> {
        let max = self.max_elements;
        let (id, structure) = self.defining.as_mut().ok_or(RuntimeError::NoOpenStructure)?;
        let expected = structure.elements.len() as u32;
        if index >= max {
            return Err(RuntimeError::ParameterOutOfBounds {
                what: "structure element",
                value: index as i64,
                max,
            });
        }
        if index != expected {
            return Err(RuntimeError::NonContiguousElement {
                structure: *id,
                expected,
                found: index,
            });
        }
        if let Some(raw) = value {
            data_type.check_raw(raw)?;
        }
        structure.elements.push(Element { data_type, value });
        Ok(())
    }

    /// Commit the open definition, replacing any earlier one with the same id
    pub fn end(&mut self) -> Result<u32> {
        let (id, structure) = self.defining.take().ok_or(RuntimeError::NoOpenStructure)?;
        if structure.elements.is_empty() {
            return Err(RuntimeError::EmptyStructure(id));
        }
        self.slots[id as usize] = Some(structure);
        Ok(id)
    }

    pub fn get(&self, id: u32) -> Result<&Structure> {
        self.check_id(id)?;
        self.slots[id as usize]
            .as_ref()
            .ok_or(RuntimeError::UndeclaredStructure(id))
    }

    fn get_mut(&mut self, id: u32) -> Result<&mut Structure> {
        self.check_id(id)?;
        self.slots[id as usize]
            .as_mut()
            .ok_or(RuntimeError::UndeclaredStructure(id))
    }

    fn element_ref(&self, id: u32, elem: u32) -> Result<&Element> {
        self.get(id)?
            .elements
            .get(elem as usize)
            .ok_or(RuntimeError::ElementOutOfBounds { structure: id, elem })
    }

    /// Duplicate a fully defined structure into `dest`
    pub fn copy(&mut self, source: u32, dest: u32) -> Result<()> {
        let copy = self.get(source)?.clone();
        if let Some(elem) = copy.elements.iter().position(|e| e.value.is_none()) {
            return Err(RuntimeError::UndefinedElement {
                structure: source,
                elem: elem as u32,
            });
        }
        self.check_id(dest)?;
        self.slots[dest as usize] = Some(copy);
        Ok(())
    }

    /// Copy one element value between structures of matching element type
    pub fn copy_element(&mut self, source: u32, source_elem: u32, dest: u32, dest_elem: u32) -> Result<()> {
        let from = *self.element_ref(source, source_elem)?;
        let value = from.value.ok_or(RuntimeError::UndefinedElement {
            structure: source,
            elem: source_elem,
        })?;
        self.set(dest, dest_elem, from.data_type, value)
    }

    /// Set one element; `data_type` must equal the declared type
    pub fn set(&mut self, id: u32, elem: u32, data_type: DataType, raw: i128) -> Result<()> {
        let structure = self.get_mut(id)?;
        let element = structure
            .elements
            .get_mut(elem as usize)
            .ok_or(RuntimeError::ElementOutOfBounds { structure: id, elem })?;
        if element.data_type != data_type {
            return Err(RuntimeError::TypeMismatch {
                structure: id,
                elem,
                expected: element.data_type,
                found: data_type,
            });
        }
        data_type.check_raw(raw)?;
        element.value = Some(raw);
        Ok(())
    }

    /// Read one element's type and raw value
    pub fn value(&self, id: u32, elem: u32) -> Result<(DataType, i128)> {
        let element = self.element_ref(id, elem)?;
        let raw = element.value.ok_or(RuntimeError::UndefinedElement { structure: id, elem })?;
        Ok((element.data_type, raw))
    }

    /// Serialize every element in declared order
    pub fn to_bytes(&self, id: u32) -> Result<Vec<u8>> {
        let structure = self.get(id)?;
        let mut bytes = Vec::with_capacity(structure.size());
        for (elem, element) in structure.elements.iter().enumerate() {
            let raw = element.value.ok_or(RuntimeError::UndefinedElement {
                structure: id,
                elem: elem as u32,
            })?;
            bytes.extend(element.data_type.raw_to_bytes(raw)?);
        }
        Ok(bytes)
    }

    /// One-line rendering for diagnostics, e.g. `struct 0 { uint32 = 7, int16 = ? }`
    pub fn describe(&self, id: u32) -> Result<String> {
        let structure = self.get(id)?;
        let mut out = format!("struct {} {{", id);
        for (i, element) in structure.elements.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            match element.value {
                Some(raw) => write!(out, "{}{} = {}", sep, element.data_type, element.data_type.from_raw(raw)),
                None => write!(out, "{}{} = ?", sep, element.data_type),
            }
            .ok();
        }
        out.push_str(" }");
        Ok(out)
    }
}
