//! `ArgumentClass` and the `TypeClass` summary descriptor (spec §3–4.1).

/// Per-eightbyte ABI class, merged pairwise per the psABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentClass {
    NoClass,
    Integer,
    Sse,
    SseUp,
    X87,
    X87Up,
    ComplexX87,
    Pointer,
    Memory,
}

impl ArgumentClass {
    /// The symmetric, idempotent merge table from spec §3.
    pub fn merge(self, other: ArgumentClass) -> ArgumentClass {
        use ArgumentClass::*;

        if self == other {
            return self;
        }
        if self == NoClass {
            return other;
        }
        if other == NoClass {
            return self;
        }
        if self == Memory || other == Memory {
            return Memory;
        }
        if self == Integer || other == Integer {
            return Integer;
        }
        // A POINTER sharing an eightbyte with anything else only happens for
        // malformed/packed input (pointers are always 8-byte aligned and
        // 8 bytes wide); fold it into INTEGER rather than invent a new rule.
        if self == Pointer || other == Pointer {
            return Integer;
        }
        let is_x87_family =
            |c: ArgumentClass| matches!(c, X87 | X87Up | ComplexX87);
        if is_x87_family(self) || is_x87_family(other) {
            return Memory;
        }
        Sse
    }
}

/// The top-level discriminated descriptor produced per argument/return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeClass {
    pub kind: TypeClassKind,
    pub classes: Vec<ArgumentClass>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClassKind {
    Struct,
    Pointer,
    Integer,
    Float,
}

#[cfg(test)]
mod test {
    use super::*;
    use ArgumentClass::*;

    #[test]
    fn merge_is_idempotent_and_symmetric() {
        for a in [NoClass, Integer, Sse, SseUp, X87, X87Up, ComplexX87, Pointer, Memory] {
            assert_eq!(a.merge(a), a);
            for b in [NoClass, Integer, Sse, SseUp, X87, X87Up, ComplexX87, Pointer, Memory] {
                assert_eq!(a.merge(b), b.merge(a));
            }
        }
    }

    #[test]
    fn no_class_is_identity() {
        assert_eq!(NoClass.merge(Sse), Sse);
        assert_eq!(Integer.merge(NoClass), Integer);
    }

    #[test]
    fn memory_is_absorbing() {
        assert_eq!(Memory.merge(Integer), Memory);
        assert_eq!(Sse.merge(Memory), Memory);
    }

    #[test]
    fn integer_wins_over_sse() {
        assert_eq!(Integer.merge(Sse), Integer);
    }

    #[test]
    fn x87_family_clashing_with_anything_else_is_memory() {
        assert_eq!(X87.merge(Sse), Memory);
        assert_eq!(X87Up.merge(Sse), Memory);
        assert_eq!(ComplexX87.merge(Integer), Memory);
    }

    #[test]
    fn otherwise_merges_to_sse() {
        assert_eq!(Sse.merge(SseUp), Sse);
    }
}
