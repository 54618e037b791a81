//! The single-pass instruction stream rewrite.

use smallvec::SmallVec;

use crate::relocate::{ConstantPoolRelocator, RelocationContext};
use crate::util::{join_index, split_index};
use crate::TranslateError;

pub mod op;

/// What a pass over one method's code did, for reporting.
#[derive(Debug, Clone, Default)]
pub struct TranslateSummary {
    /// Constant pool indices rewritten to their relocated values
    pub relocated: usize,
    /// Reference-typed opcodes collapsed onto their integer-typed variants
    pub narrowed: usize,
    /// Narrowing numeric conversions replaced with nop
    pub elided: usize,
    /// Offsets at which a getstatic of a natively provided object became a
    /// sipush of its id
    pub native_pushes: SmallVec<[usize; 4]>,
}

/// Rewrites `code` in place for the target machine: relocates every
/// constant pool index through `ctx`, collapses reference-typed opcodes
/// onto their integer-typed equivalents, and turns getstatic of a natively
/// provided object into a push of its id.
///
/// Every rewrite is a byte-for-byte substitution; the stream length and the
/// offset of every instruction are unchanged. The cursor always advances by
/// the operand width looked up before any rewrite, which is only sound
/// because every rule here preserves operand width.
///
/// The stream is trusted to be well formed (produced by the class file
/// parser); a stream truncated mid-operand is outside this function's
/// contract. An opcode the target machine lacks fails the whole method,
/// since skipping it would desynchronize every later offset.
pub fn translate_code<R: ConstantPoolRelocator>(
    ctx: &RelocationContext<'_, R>,
    code: &mut [u8],
) -> Result<TranslateSummary, TranslateError> {
    let mut summary = TranslateSummary::default();

    let mut i = 0;
    while i < code.len() {
        let opcode = code[i];
        let width = match op::operand_bytes(opcode) {
            Some(width) => width,
            None => return Err(TranslateError::UnsupportedOpcode { opcode, offset: i }),
        };

        match opcode {
            // Single byte pool index, e.g. string constants
            op::LDC => {
                let index = u16::from(code[i + 1]);
                let new_index = ctx.relocator.relocate(index)?;
                tracing::debug!("ldc #{} -> #{}", index, new_index);
                if new_index > 0xff {
                    // The compactor overflowed a single byte slot; the low
                    // byte is still written, matching the serialized form
                    tracing::warn!(
                        "relocated ldc index #{} does not fit one byte",
                        new_index
                    );
                }
                code[i + 1] = (new_index & 0xff) as u8;
                summary.relocated += 1;
            }
            op::GETFIELD | op::PUTFIELD => {
                let index = join_index(code[i + 1], code[i + 2]);
                let new_index = ctx.relocator.relocate(index)?;
                tracing::debug!("get/putfield #{} -> #{}", index, new_index);
                let (hi, lo) = split_index(new_index);
                code[i + 1] = hi;
                code[i + 2] = lo;
                summary.relocated += 1;
            }
            op::GETSTATIC | op::PUTSTATIC => {
                let index = join_index(code[i + 1], code[i + 2]);
                let new_index = ctx.relocator.relocate(index)?;
                tracing::debug!("get/putstatic #{} -> #{}", index, new_index);
                let (hi, lo) = split_index(new_index);
                code[i + 1] = hi;
                code[i + 2] = lo;
                summary.relocated += 1;

                // A getstatic of a natively provided object resolves to an
                // id, not a pool entry. The id is simply pushed onto the
                // stack, so the opcode becomes a push instruction.
                if opcode == op::GETSTATIC && hi >= ctx.lowest_native_id {
                    code[i] = op::SIPUSH;
                    summary.native_pushes.push(i);
                }
            }
            op::INVOKEVIRTUAL | op::INVOKESPECIAL | op::INVOKESTATIC => {
                let index = join_index(code[i + 1], code[i + 2]);
                let new_index = ctx.relocator.relocate(index)?;
                tracing::debug!("invoke #{} -> #{}", index, new_index);
                let (hi, lo) = split_index(new_index);
                code[i + 1] = hi;
                code[i + 2] = lo;
                summary.relocated += 1;
            }
            op::NEW => {
                let index = join_index(code[i + 1], code[i + 2]);
                let new_index = ctx.relocator.relocate(index)?;
                tracing::debug!("new #{} -> #{}", index, new_index);
                let (hi, lo) = split_index(new_index);
                code[i + 1] = hi;
                code[i + 2] = lo;
                summary.relocated += 1;
            }
            op::TABLESWITCH => {
                // Its data lives outside the stream on the target machine;
                // nothing to rewrite
                tracing::debug!("tableswitch at offset {}", i);
            }

            // Reference and integer locals share a representation on the
            // target machine, so the reference-typed forms collapse onto
            // the integer-typed ones
            op::ASTORE => {
                code[i] = op::ISTORE;
                summary.narrowed += 1;
            }
            op::ASTORE_0..=op::ASTORE_3 => {
                code[i] = op::ISTORE_0 + (opcode - op::ASTORE_0);
                summary.narrowed += 1;
            }
            op::ALOAD_0..=op::ALOAD_3 => {
                code[i] = op::ILOAD_0 + (opcode - op::ALOAD_0);
                summary.narrowed += 1;
            }
            op::ACONST_NULL => {
                code[i] = op::ICONST_0;
                summary.narrowed += 1;
            }

            // ints, bytes and shorts are the same internal type, so the
            // narrowing conversions are void
            op::I2B | op::I2C | op::I2S => {
                code[i] = op::NOP;
                summary.elided += 1;
            }

            _ => {}
        }

        i += 1 + usize::from(width);
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::op;
    use super::{translate_code, TranslateSummary};
    use crate::relocate::{ConstantPoolRelocator, MapRelocator, RelocateError, RelocationContext};
    use crate::TranslateError;

    /// Relocator that refuses every index, for rules that must never
    /// consult it.
    struct RefuseAll;
    impl ConstantPoolRelocator for RefuseAll {
        fn relocate(&self, index: u16) -> Result<u16, RelocateError> {
            Err(RelocateError::UnknownIndex { index })
        }
    }

    fn ctx_with<R: ConstantPoolRelocator>(
        relocator: &R,
        lowest_native_id: u8,
    ) -> RelocationContext<'_, R> {
        RelocationContext::new(relocator, lowest_native_id)
    }

    fn single_entry(old: u16, new: u16) -> MapRelocator {
        std::iter::once((old, new)).collect()
    }

    #[test]
    fn ldc_single_byte_relocation() {
        let relocator = single_entry(5, 2);
        let ctx = ctx_with(&relocator, 0xd0);
        let mut code = [op::LDC, 5, op::NOP];

        let summary = translate_code(&ctx, &mut code).unwrap();
        assert_eq!(code, [op::LDC, 2, op::NOP]);
        assert_eq!(summary.relocated, 1);
    }

    #[test]
    fn ldc_overflowing_relocation_keeps_low_byte() {
        let relocator = single_entry(5, 0x1ff);
        let ctx = ctx_with(&relocator, 0xd0);
        let mut code = [op::LDC, 5];

        translate_code(&ctx, &mut code).unwrap();
        assert_eq!(code[1], 0xff);
    }

    #[test]
    fn getfield_two_byte_relocation() {
        let relocator = single_entry(0x0102, 0x0304);
        let ctx = ctx_with(&relocator, 0xd0);
        let mut code = [op::GETFIELD, 0x01, 0x02];

        translate_code(&ctx, &mut code).unwrap();
        assert_eq!(code, [op::GETFIELD, 0x03, 0x04]);
    }

    #[test]
    fn getstatic_of_native_object_becomes_push() {
        let relocator = single_entry(7, 0xd105);
        let ctx = ctx_with(&relocator, 0xd0);
        let mut code = [op::GETSTATIC, 0, 7];

        let summary = translate_code(&ctx, &mut code).unwrap();
        assert_eq!(code, [op::SIPUSH, 0xd1, 0x05]);
        assert_eq!(summary.native_pushes.as_slice(), [0]);
    }

    #[test]
    fn getstatic_below_threshold_is_only_relocated() {
        let relocator = single_entry(7, 0x0105);
        let ctx = ctx_with(&relocator, 0xd0);
        let mut code = [op::GETSTATIC, 0, 7];

        let summary = translate_code(&ctx, &mut code).unwrap();
        assert_eq!(code, [op::GETSTATIC, 0x01, 0x05]);
        assert!(summary.native_pushes.is_empty());
    }

    #[test]
    fn putstatic_never_becomes_push() {
        let relocator = single_entry(7, 0xd105);
        let ctx = ctx_with(&relocator, 0xd0);
        let mut code = [op::PUTSTATIC, 0, 7];

        translate_code(&ctx, &mut code).unwrap();
        assert_eq!(code, [op::PUTSTATIC, 0xd1, 0x05]);
    }

    #[test]
    fn invokes_and_new_relocate_their_index() {
        for opcode in [
            op::INVOKEVIRTUAL,
            op::INVOKESPECIAL,
            op::INVOKESTATIC,
            op::NEW,
        ] {
            let relocator = single_entry(0x0010, 0x0003);
            let ctx = ctx_with(&relocator, 0xd0);
            let mut code = [opcode, 0x00, 0x10];

            translate_code(&ctx, &mut code).unwrap();
            assert_eq!(code, [opcode, 0x00, 0x03]);
        }
    }

    #[test]
    fn reference_opcodes_narrow_without_consulting_the_relocator() {
        let ctx = ctx_with(&RefuseAll, 0xd0);

        let mut code = [
            op::ACONST_NULL,
            op::ASTORE,
            0x02,
            op::ALOAD_0,
            op::ALOAD_3,
            op::ASTORE_0,
            op::ASTORE_3,
        ];
        let summary = translate_code(&ctx, &mut code).unwrap();

        assert_eq!(
            code,
            [
                op::ICONST_0,
                op::ISTORE,
                0x02,
                op::ILOAD_0,
                op::ILOAD_3,
                op::ISTORE_0,
                op::ISTORE_3,
            ]
        );
        assert_eq!(summary.narrowed, 6);
    }

    #[test]
    fn narrowing_conversions_become_nop() {
        let ctx = ctx_with(&RefuseAll, 0xd0);
        let mut code = [op::I2B, op::I2C, op::I2S];

        let summary = translate_code(&ctx, &mut code).unwrap();
        assert_eq!(code, [op::NOP, op::NOP, op::NOP]);
        assert_eq!(summary.elided, 3);
    }

    #[test]
    fn unsupported_opcode_is_fatal() {
        let ctx = ctx_with(&RefuseAll, 0xd0);
        let mut code = [0xc0];

        let err = translate_code(&ctx, &mut code).unwrap_err();
        assert_eq!(
            err,
            TranslateError::UnsupportedOpcode {
                opcode: 0xc0,
                offset: 0,
            }
        );
    }

    #[test]
    fn unsupported_opcode_reports_its_offset() {
        let relocator = single_entry(1, 1);
        let ctx = ctx_with(&relocator, 0xd0);
        let mut code = [op::LDC, 1, op::NOP, 0xff];

        let err = translate_code(&ctx, &mut code).unwrap_err();
        assert_eq!(
            err,
            TranslateError::UnsupportedOpcode {
                opcode: 0xff,
                offset: 3,
            }
        );
    }

    #[test]
    fn relocator_failure_passes_through() {
        let ctx = ctx_with(&RefuseAll, 0xd0);
        let mut code = [op::NEW, 0x00, 0x05];

        let err = translate_code(&ctx, &mut code).unwrap_err();
        assert_eq!(
            err,
            TranslateError::Relocate(RelocateError::UnknownIndex { index: 5 })
        );
    }

    #[test]
    fn pass_through_opcodes_are_untouched_and_length_is_kept() {
        // sipush, bipush, iinc and a plain return: relocation-free stream
        let relocator = MapRelocator::new();
        let ctx = ctx_with(&relocator, 0xd0);
        let original = [0x11, 0x01, 0x00, 0x10, 0x7f, 0x84, 0x01, 0x01, 0xb1];
        let mut code = original;

        let summary = translate_code(&ctx, &mut code).unwrap();
        assert_eq!(code, original);
        assert_eq!(code.len(), original.len());
        assert_eq!(summary.relocated, 0);
        assert_eq!(summary.narrowed, 0);
    }

    #[test]
    fn walk_ends_exactly_on_the_stream_boundary() {
        // Last instruction carries operands right up to the end
        let relocator = single_entry(0x0102, 0x0001);
        let ctx = ctx_with(&relocator, 0xd0);
        let mut code = [op::ALOAD_0, op::GETFIELD, 0x01, 0x02];

        let summary = translate_code(&ctx, &mut code).unwrap();
        assert_eq!(code, [op::ILOAD_0, op::GETFIELD, 0x00, 0x01]);
        assert_eq!(summary.relocated, 1);
        assert_eq!(summary.narrowed, 1);
    }

    #[test]
    fn tableswitch_is_left_alone() {
        let ctx = ctx_with(&RefuseAll, 0xd0);
        let mut code = [op::TABLESWITCH, op::NOP];

        translate_code(&ctx, &mut code).unwrap();
        assert_eq!(code, [op::TABLESWITCH, op::NOP]);
    }

    #[test]
    fn summary_default_is_empty() {
        let summary = TranslateSummary::default();
        assert_eq!(summary.relocated, 0);
        assert!(summary.native_pushes.is_empty());
    }
}
