//! # Command Encoding Constants and Helpers
//!
//! Centralized constants and helper functions shared by the encoder
//! (generator side) and the decoder (executor and disassembler side).
//!
//! ## Header Word (32-bit, little-endian)
//!
//! ```text
//! [31:24] opcode
//! [23:16] register flags, bit i => operand slot i holds a register index
//! [15:0]  number of payload words following the header
//! ```
//!
//! ## Payload Fields
//!
//! ```text
//! word     u32
//! double   i64 / u64 as two words, low word first
//! operand  two words; immediate i64, or register index + 0 when flagged
//! bytes    length word, then the bytes zero-padded to a word boundary
//! ```

// ============================================================================
// Bit Position Constants
// ============================================================================

/// Opcode field: bits 24-31
pub const OPCODE_SHIFT: u32 = 24;

/// Register flags field: bits 16-23
pub const FLAGS_SHIFT: u32 = 16;

/// Payload length field: bits 0-15
pub const LENGTH_SHIFT: u32 = 0;

// ============================================================================
// Field Masks
// ============================================================================

/// Opcode mask (8 bits)
pub const OPCODE_MASK: u32 = 0xFF;

/// Register flags mask (8 bits)
pub const FLAGS_MASK: u32 = 0xFF;

/// Payload length mask (16 bits)
pub const LENGTH_MASK: u32 = 0xFFFF;

// ============================================================================
// Sizes
// ============================================================================

/// Bytes per word
pub const WORD_SIZE: usize = 4;

/// Words per operand slot
pub const OPERAND_WORDS: usize = 2;

/// Largest payload a header can describe, in words
pub const MAX_PAYLOAD_WORDS: usize = LENGTH_MASK as usize;

// ============================================================================
// Header Encoding / Extraction
// ============================================================================

#[inline]
pub const fn encode_header(opcode: u8, flags: u8, length: u16) -> u32 {
    ((opcode as u32) << OPCODE_SHIFT) | ((flags as u32) << FLAGS_SHIFT) | ((length as u32) << LENGTH_SHIFT)
}

/// Extract the opcode byte (bits 24-31)
#[inline]
pub const fn extract_opcode(header: u32) -> u8 {
    ((header >> OPCODE_SHIFT) & OPCODE_MASK) as u8
}

/// Extract the register flags (bits 16-23)
#[inline]
pub const fn extract_flags(header: u32) -> u8 {
    ((header >> FLAGS_SHIFT) & FLAGS_MASK) as u8
}

/// Extract the payload length in words (bits 0-15)
#[inline]
pub const fn extract_length(header: u32) -> usize {
    ((header >> LENGTH_SHIFT) & LENGTH_MASK) as usize
}

/// True when operand slot `slot` is flagged as a register reference
#[inline]
pub const fn is_register_slot(flags: u8, slot: usize) -> bool {
    slot < 8 && flags & (1 << slot) != 0
}

// ============================================================================
// Field Helpers
// ============================================================================

/// Split a 64-bit value into (low, high) words
#[inline]
pub const fn split_u64(value: u64) -> (u32, u32) {
    (value as u32, (value >> 32) as u32)
}

/// Join (low, high) words into a 64-bit value
#[inline]
pub const fn join_u64(low: u32, high: u32) -> u64 {
    (low as u64) | ((high as u64) << 32)
}

/// Number of words needed to hold `len` bytes
#[inline]
pub const fn padded_words(len: usize) -> usize {
    (len + WORD_SIZE - 1) / WORD_SIZE
}

/// Pack bytes into little-endian words, zero-padding the last one
pub fn pack_bytes(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks(WORD_SIZE)
        .map(|chunk| {
            let mut buf = [0u8; WORD_SIZE];
            buf[..chunk.len()].copy_from_slice(chunk);
            u32::from_le_bytes(buf)
        })
        .collect()
}

/// Unpack the first `len` bytes of little-endian words
pub fn unpack_bytes(words: &[u32], len: usize) -> Vec<u8> {
    let mut bytes = words_to_bytes(words);
    bytes.truncate(len);
    bytes
}

/// Serialize words as a little-endian byte stream
pub fn words_to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

/// Read the little-endian word at byte `offset`, if fully present
pub fn read_word(bytes: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(WORD_SIZE)?;
    let slice = bytes.get(offset..end)?;
    Some(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}
