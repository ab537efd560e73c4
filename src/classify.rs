//! Layout classifier: `classify_type` (per-eightbyte class vector) and
//! `classify_layout` (the `TypeClass` summary), spec §4.1.

use crate::class::{ArgumentClass, TypeClass, TypeClassKind};
use crate::error::CallArrangerError;
use crate::layout::{align_up, GroupMember, MemoryLayout, ValueClass};

const MAX_EIGHTBYTES: u64 = 8;

/// Recursively classifies `layout` into an ordered vector of per-eightbyte
/// ABI classes. Total on the supported layout grammar.
pub fn classify_type(layout: &MemoryLayout) -> Result<Vec<ArgumentClass>, CallArrangerError> {
    let result = match layout {
        MemoryLayout::Value { size, class, .. } => classify_value(*size, *class),
        MemoryLayout::Sequence {
            size,
            element,
            count,
            ..
        } => classify_sequence(*size, element, *count),
        MemoryLayout::Group {
            size,
            is_union,
            is_complex_x87,
            members,
            ..
        } => classify_group(*size, *is_union, *is_complex_x87, members),
    };

    if let Ok(classes) = &result {
        log::trace!(
            "classified layout of size {} into {} eightbyte(s)",
            layout.byte_size(),
            classes.len()
        );
    }

    result
}

/// Collapses a class vector plus the top-level layout kind into a `TypeClass`.
pub fn classify_layout(layout: &MemoryLayout) -> Result<TypeClass, CallArrangerError> {
    match layout {
        MemoryLayout::Value { class, .. } => {
            let kind = match class.ok_or_else(|| {
                CallArrangerError::UnsupportedLayout(
                    "value layout is missing its ABI-class annotation".into(),
                )
            })? {
                ValueClass::Pointer => TypeClassKind::Pointer,
                ValueClass::Integer => TypeClassKind::Integer,
                ValueClass::Sse => TypeClassKind::Float,
                ValueClass::X87 => {
                    return Err(CallArrangerError::UnsupportedLayout(
                        "a bare X87 value cannot appear as a top-level argument or return type"
                            .into(),
                    ))
                }
            };
            let classes = classify_type(layout)?;
            if kind == TypeClassKind::Float {
                debug_assert_eq!(classes.len(), 1, "an SSE value must classify to one eightbyte");
            }
            Ok(TypeClass { kind, classes })
        }
        MemoryLayout::Sequence { .. } => Err(CallArrangerError::UnsupportedLayout(
            "a sequence layout cannot appear as a top-level argument or return type".into(),
        )),
        MemoryLayout::Group { .. } => {
            let classes = classify_type(layout)?;
            Ok(TypeClass {
                kind: TypeClassKind::Struct,
                classes,
            })
        }
    }
}

fn classify_value(
    size: u64,
    class: Option<ValueClass>,
) -> Result<Vec<ArgumentClass>, CallArrangerError> {
    let class = class.ok_or_else(|| {
        CallArrangerError::UnsupportedLayout(
            "value layout is missing its ABI-class annotation".into(),
        )
    })?;
    Ok(match class {
        ValueClass::Pointer => vec![ArgumentClass::Pointer],
        ValueClass::Sse => vec![ArgumentClass::Sse],
        ValueClass::X87 => vec![ArgumentClass::X87, ArgumentClass::X87Up],
        ValueClass::Integer => {
            let words = (align_up(size, 8) / 8).max(1);
            vec![ArgumentClass::Integer; words as usize]
        }
    })
}

fn classify_sequence(
    size: u64,
    element: &MemoryLayout,
    count: u64,
) -> Result<Vec<ArgumentClass>, CallArrangerError> {
    let n_words = (align_up(size, 8) / 8).max(1);
    if n_words > MAX_EIGHTBYTES {
        return Ok(vec![ArgumentClass::Memory; n_words as usize]);
    }

    let mut classes = vec![ArgumentClass::NoClass; n_words as usize];
    let elem_align = element.byte_align();
    let elem_size = element.byte_size();
    let mut offset = 0u64;

    for _ in 0..count {
        offset = align_up(offset, elem_align.max(1));
        // TODO: a zero-length element (elem_size == 0, e.g. a zero-length
        // array member) contributes no eightbytes; confirmed against the
        // general psABI treatment of zero-sized members as contributing
        // nothing to classification.
        if elem_size > 0 {
            let sub = classify_type(element)?;
            merge_into(&mut classes, offset, &sub);
        }
        offset += elem_size;
    }

    apply_psabi_fixups(classes, false)
}

fn classify_group(
    size: u64,
    is_union: bool,
    is_complex_x87: bool,
    members: &[GroupMember],
) -> Result<Vec<ArgumentClass>, CallArrangerError> {
    if is_complex_x87 {
        let classes = vec![
            ArgumentClass::X87,
            ArgumentClass::X87Up,
            ArgumentClass::X87,
            ArgumentClass::X87Up,
        ];
        return apply_psabi_fixups(classes, true);
    }

    let n_words = (align_up(size, 8) / 8).max(1);
    if n_words > MAX_EIGHTBYTES {
        return Ok(vec![ArgumentClass::Memory; n_words as usize]);
    }

    let mut classes = vec![ArgumentClass::NoClass; n_words as usize];
    let mut offset = 0u64;

    for member in members {
        match member {
            GroupMember::Padding { size } => {
                if !is_union {
                    offset += size;
                }
            }
            GroupMember::Field(field) => {
                // Zero-length fields (e.g. a zero-length array member) are
                // skipped the same way a padding member is; see the TODO in
                // `classify_sequence`.
                if field.byte_size() > 0 {
                    let sub = classify_type(field)?;
                    merge_into(&mut classes, offset, &sub);
                }
                if !is_union {
                    offset += field.byte_size();
                }
            }
        }
    }

    apply_psabi_fixups(classes, true)
}

/// Merges `sub` into `classes` starting at the eightbyte containing `offset`.
fn merge_into(classes: &mut [ArgumentClass], offset: u64, sub: &[ArgumentClass]) {
    let start = (offset / 8) as usize;
    for (i, &c) in sub.iter().enumerate() {
        let slot = start + i;
        if slot < classes.len() {
            classes[slot] = classes[slot].merge(c);
        }
    }
}

/// Shared post-classification fixup logic for arrays and structs (spec §4.1).
///
/// `is_group` distinguishes the struct case, where a leading X87UP is a hard
/// `MalformedLayout` error rather than a silent collapse to MEMORY.
fn apply_psabi_fixups(
    mut classes: Vec<ArgumentClass>,
    is_group: bool,
) -> Result<Vec<ArgumentClass>, CallArrangerError> {
    let all_memory = |classes: &[ArgumentClass]| vec![ArgumentClass::Memory; classes.len()];

    if classes.iter().any(|&c| c == ArgumentClass::Memory) {
        return Ok(all_memory(&classes));
    }

    if is_group && classes.first() == Some(&ArgumentClass::X87Up) {
        return Err(CallArrangerError::MalformedLayout);
    }

    for i in 0..classes.len() {
        if classes[i] == ArgumentClass::X87Up && (i == 0 || classes[i - 1] != ArgumentClass::X87) {
            return Ok(all_memory(&classes));
        }
    }

    // An X87/X87UP/COMPLEX_X87 eightbyte that survives the misplacement
    // checks above still can't be handed a register: the psABI reserves
    // st0/st1 for a bare `long double` return and never allocates an x87
    // register to a struct/array member or argument.
    if classes
        .iter()
        .any(|&c| matches!(c, ArgumentClass::X87 | ArgumentClass::X87Up | ArgumentClass::ComplexX87))
    {
        return Ok(all_memory(&classes));
    }

    if classes.len() > 2 {
        let sse_extended = classes[0] == ArgumentClass::Sse
            && classes[1..].iter().all(|&c| c == ArgumentClass::SseUp);
        if !sse_extended {
            return Ok(all_memory(&classes));
        }
    }

    classes.shrink_to_fit();
    Ok(classes)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::layout::GroupMember;

    #[test]
    fn scalar_int_classifies_to_one_integer_eightbyte() {
        let classes = classify_type(&MemoryLayout::integer(4)).unwrap();
        assert_eq!(classes, vec![ArgumentClass::Integer]);
    }

    #[test]
    fn int128_classifies_to_two_integer_eightbytes() {
        let classes = classify_type(&MemoryLayout::integer(16)).unwrap();
        assert_eq!(classes, vec![ArgumentClass::Integer, ArgumentClass::Integer]);
    }

    #[test]
    fn x87_classifies_to_x87_then_x87up() {
        let classes = classify_type(&MemoryLayout::x87()).unwrap();
        assert_eq!(classes, vec![ArgumentClass::X87, ArgumentClass::X87Up]);
    }

    #[test]
    fn two_int64_struct_is_two_integer_eightbytes() {
        let s = MemoryLayout::group_struct(
            vec![
                GroupMember::Field(MemoryLayout::integer(8)),
                GroupMember::Field(MemoryLayout::integer(8)),
            ],
            16,
            8,
        );
        let classes = classify_type(&s).unwrap();
        assert_eq!(classes, vec![ArgumentClass::Integer, ArgumentClass::Integer]);
    }

    #[test]
    fn three_int64_struct_is_memory() {
        let s = MemoryLayout::group_struct(
            vec![
                GroupMember::Field(MemoryLayout::integer(8)),
                GroupMember::Field(MemoryLayout::integer(8)),
                GroupMember::Field(MemoryLayout::integer(8)),
            ],
            24,
            8,
        );
        let classes = classify_type(&s).unwrap();
        assert_eq!(classes, vec![ArgumentClass::Memory; 3]);
    }

    #[test]
    fn two_float_struct_is_one_sse_eightbyte() {
        let s = MemoryLayout::group_struct(
            vec![
                GroupMember::Field(MemoryLayout::sse(4)),
                GroupMember::Field(MemoryLayout::sse(4)),
            ],
            8,
            4,
        );
        let classes = classify_type(&s).unwrap();
        assert_eq!(classes, vec![ArgumentClass::Sse]);
    }

    #[test]
    fn aggregate_over_eight_eightbytes_is_memory() {
        let huge = MemoryLayout::array(MemoryLayout::integer(8), 9);
        let classes = classify_type(&huge).unwrap();
        assert_eq!(classes, vec![ArgumentClass::Memory; 9]);
    }

    #[test]
    fn leading_x87up_in_struct_is_malformed() {
        // No legitimate layout produces a leading X87UP (an X87 value
        // always contributes its X87UP as the *second* eightbyte); this
        // exercises the hard-error path directly, as spec §4.1 describes it.
        let err = apply_psabi_fixups(vec![ArgumentClass::X87Up], true).unwrap_err();
        assert!(matches!(err, CallArrangerError::MalformedLayout));
    }

    #[test]
    fn leading_x87up_in_array_collapses_to_memory() {
        // Outside the struct case, the same malformed shape just collapses
        // to MEMORY rather than erroring.
        let classes = apply_psabi_fixups(vec![ArgumentClass::X87Up], false).unwrap();
        assert_eq!(classes, vec![ArgumentClass::Memory]);
    }

    #[test]
    fn union_overlay_does_not_advance_offset() {
        let u = MemoryLayout::group_union(
            vec![
                GroupMember::Field(MemoryLayout::integer(4)),
                GroupMember::Field(MemoryLayout::sse(4)),
            ],
            4,
            4,
        );
        // Both members occupy eightbyte 0; INTEGER beats SSE in the merge.
        let classes = classify_type(&u).unwrap();
        assert_eq!(classes, vec![ArgumentClass::Integer]);
    }

    #[test]
    fn complex_long_double_is_memory() {
        // `_Complex long double` is always passed in memory; no register
        // file has four consecutive slots for it.
        let classes = classify_type(&MemoryLayout::complex_x87()).unwrap();
        assert_eq!(classes, vec![ArgumentClass::Memory; 4]);
    }

    #[test]
    fn struct_with_a_long_double_field_is_memory() {
        // A bare `long double` member classifies to [X87, X87Up], which
        // passes the leading-misplacement and >2-eightbyte checks
        // unscathed; it still can't be handed an integer/vector register.
        let s = MemoryLayout::group_struct(
            vec![GroupMember::Field(MemoryLayout::x87())],
            16,
            16,
        );
        let classes = classify_type(&s).unwrap();
        assert_eq!(classes, vec![ArgumentClass::Memory; 2]);
    }

    #[test]
    fn zero_length_array_member_contributes_nothing() {
        let zero_len = MemoryLayout::array(MemoryLayout::integer(4), 0);
        let s = MemoryLayout::group_struct(
            vec![
                GroupMember::Field(zero_len),
                GroupMember::Field(MemoryLayout::integer(4)),
            ],
            4,
            4,
        );
        let classes = classify_type(&s).unwrap();
        assert_eq!(classes, vec![ArgumentClass::Integer]);
    }
}
