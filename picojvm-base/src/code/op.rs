//! Opcode identities and operand widths for the target instruction set.

/// A raw opcode byte, unsigned-interpreted.
pub type RawOpcode = u8;

pub const NOP: RawOpcode = 0x00;
pub const ACONST_NULL: RawOpcode = 0x01;
pub const ICONST_0: RawOpcode = 0x03;
pub const SIPUSH: RawOpcode = 0x11;
pub const LDC: RawOpcode = 0x12;
pub const ILOAD_0: RawOpcode = 0x1a;
pub const ILOAD_1: RawOpcode = 0x1b;
pub const ILOAD_2: RawOpcode = 0x1c;
pub const ILOAD_3: RawOpcode = 0x1d;
pub const ALOAD_0: RawOpcode = 0x2a;
pub const ALOAD_1: RawOpcode = 0x2b;
pub const ALOAD_2: RawOpcode = 0x2c;
pub const ALOAD_3: RawOpcode = 0x2d;
pub const ISTORE: RawOpcode = 0x36;
pub const ASTORE: RawOpcode = 0x3a;
pub const ISTORE_0: RawOpcode = 0x3b;
pub const ISTORE_1: RawOpcode = 0x3c;
pub const ISTORE_2: RawOpcode = 0x3d;
pub const ISTORE_3: RawOpcode = 0x3e;
pub const ASTORE_0: RawOpcode = 0x4b;
pub const ASTORE_1: RawOpcode = 0x4c;
pub const ASTORE_2: RawOpcode = 0x4d;
pub const ASTORE_3: RawOpcode = 0x4e;
pub const I2B: RawOpcode = 0x91;
pub const I2C: RawOpcode = 0x92;
pub const I2S: RawOpcode = 0x93;
pub const TABLESWITCH: RawOpcode = 0xaa;
pub const GETSTATIC: RawOpcode = 0xb2;
pub const PUTSTATIC: RawOpcode = 0xb3;
pub const GETFIELD: RawOpcode = 0xb4;
pub const PUTFIELD: RawOpcode = 0xb5;
pub const INVOKEVIRTUAL: RawOpcode = 0xb6;
pub const INVOKESPECIAL: RawOpcode = 0xb7;
pub const INVOKESTATIC: RawOpcode = 0xb8;
pub const NEW: RawOpcode = 0xbb;

/// Immediate operand bytes following each of the 256 opcodes, `-1` marking
/// the opcodes the target machine does not implement. This is a
/// compatibility contract with the target VM's instruction set listing, not
/// something to tune.
#[rustfmt::skip]
static OPERAND_BYTES: [i8; 256] = [
 // x0  x1  x2  x3  x4  x5  x6  x7  x8  x9  xa  xb  xc  xd  xe  xf
     0,  0,  0,  0,  0,  0,  0,  0,  0, -1, -1,  0,  0,  0, -1, -1, // 0x
     1,  2,  1, -1, -1,  1, -1,  1, -1, -1,  0,  0,  0,  0, -1, -1, // 1x
    -1, -1,  0,  0,  0,  0, -1, -1, -1, -1,  0,  0,  0,  0,  0, -1, // 2x
     0, -1, -1,  0, -1, -1,  1, -1,  1, -1,  1,  0,  0,  0,  0, -1, // 3x
    -1, -1, -1,  0,  0,  0,  0, -1, -1, -1, -1,  0,  0,  0,  0,  0, // 4x
    -1,  0, -1, -1,  0, -1, -1,  0,  0,  0, -1, -1,  0, -1, -1, -1, // 5x
     0, -1,  0, -1,  0, -1,  0, -1,  0, -1,  0, -1,  0, -1,  0, -1, // 6x
     0, -1,  0, -1,  0, -1,  0, -1,  0, -1,  0, -1,  0, -1,  0, -1, // 7x
     0, -1,  0, -1,  2, -1,  0, -1, -1, -1, -1,  0, -1, -1, -1, -1, // 8x
    -1,  0,  0,  0, -1,  0,  0, -1, -1,  2,  2,  2,  2,  2,  2,  2, // 9x
     2,  2,  2,  2,  2, -1, -1,  2, -1, -1,  0, -1,  0, -1,  0, -1, // ax
    -1,  0,  2,  2,  2,  2,  2,  2,  2, -1, -1,  2,  1, -1,  0, -1, // bx
    -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, // cx
    -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, // dx
    -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, // ex
    -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, // fx
];

/// The number of immediate operand bytes that follow `opcode`, or `None`
/// if the target machine does not implement it.
#[must_use]
pub fn operand_bytes(opcode: RawOpcode) -> Option<u8> {
    u8::try_from(OPERAND_BYTES[usize::from(opcode)]).ok()
}

#[must_use]
pub fn is_supported(opcode: RawOpcode) -> bool {
    operand_bytes(opcode).is_some()
}

/// Mnemonic for the opcodes the translator treats specially.
/// Other opcodes pass through untouched and are only ever displayed in hex.
#[must_use]
pub fn name(opcode: RawOpcode) -> Option<&'static str> {
    Some(match opcode {
        NOP => "nop",
        ACONST_NULL => "aconst_null",
        ICONST_0 => "iconst_0",
        SIPUSH => "sipush",
        LDC => "ldc",
        ILOAD_0 => "iload_0",
        ILOAD_1 => "iload_1",
        ILOAD_2 => "iload_2",
        ILOAD_3 => "iload_3",
        ALOAD_0 => "aload_0",
        ALOAD_1 => "aload_1",
        ALOAD_2 => "aload_2",
        ALOAD_3 => "aload_3",
        ISTORE => "istore",
        ASTORE => "astore",
        ISTORE_0 => "istore_0",
        ISTORE_1 => "istore_1",
        ISTORE_2 => "istore_2",
        ISTORE_3 => "istore_3",
        ASTORE_0 => "astore_0",
        ASTORE_1 => "astore_1",
        ASTORE_2 => "astore_2",
        ASTORE_3 => "astore_3",
        I2B => "i2b",
        I2C => "i2c",
        I2S => "i2s",
        TABLESWITCH => "tableswitch",
        GETSTATIC => "getstatic",
        PUTSTATIC => "putstatic",
        GETFIELD => "getfield",
        PUTFIELD => "putfield",
        INVOKEVIRTUAL => "invokevirtual",
        INVOKESPECIAL => "invokespecial",
        INVOKESTATIC => "invokestatic",
        NEW => "new",
        _ => return None,
    })
}
