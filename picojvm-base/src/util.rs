//! Byte level helpers shared by the rewrite pass and its callers.

/// Reinterpret a signed 8-bit storage cell as the stream's logical
/// unsigned value. Apply to every opcode/operand byte read from a
/// signed-byte buffer.
#[must_use]
pub fn to_unsigned(b: i8) -> u8 {
    b as u8
}

/// Reinterpret a logical unsigned byte as its signed 8-bit storage form.
/// Apply to every computed index byte written into a signed-byte buffer.
#[must_use]
pub fn to_signed(u: u8) -> i8 {
    u as i8
}

/// Big-endian 16-bit constant pool index from its two operand bytes.
#[must_use]
pub fn join_index(hi: u8, lo: u8) -> u16 {
    (u16::from(hi) << 8) | u16::from(lo)
}

/// The two big-endian operand bytes of a 16-bit constant pool index.
#[must_use]
pub fn split_index(index: u16) -> (u8, u8) {
    ((index >> 8) as u8, (index & 0xff) as u8)
}
