//! Storage calculator: stateful allocation of integer registers, vector
//! registers, and stack slots under the psABI exhaustion rules (spec §4.2).

use crate::class::{ArgumentClass, TypeClass};

/// A location that can hold an argument/return piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VMStorage {
    IntegerRegister(u8),
    VectorRegister(u8),
    Stack(u32),
    /// The synthetic `rax`/AL scratch storage carrying the variadic
    /// vector-register count (spec §4.5); never produced by `next_storage`.
    VectorCountRegister,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Integer,
    Vector,
}

/// Whether a `StorageCalculator` is allocating for arguments or a return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Argument,
    Return,
}

impl Direction {
    fn integer_cap(self) -> u8 {
        match self {
            Direction::Argument => 6,
            Direction::Return => 2,
        }
    }

    fn vector_cap(self) -> u8 {
        match self {
            Direction::Argument => 8,
            Direction::Return => 2,
        }
    }
}

/// Stateful, exclusively-owned allocator. One instance lives for the
/// duration of a single call site's argument (or return) construction.
#[derive(Debug)]
pub struct StorageCalculator {
    direction: Direction,
    n_integer_reg: u8,
    n_vector_reg: u8,
    stack_offset: u32,
}

impl StorageCalculator {
    pub fn new(direction: Direction) -> Self {
        StorageCalculator {
            direction,
            n_integer_reg: 0,
            n_vector_reg: 0,
            stack_offset: 0,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn n_integer_reg(&self) -> u8 {
        self.n_integer_reg
    }

    pub fn n_vector_reg(&self) -> u8 {
        self.n_vector_reg
    }

    /// Allocates the next register of `kind`, falling through to the stack
    /// (arguments only) once the per-direction cap is exhausted.
    pub fn next_storage(&mut self, kind: StorageKind) -> VMStorage {
        match kind {
            StorageKind::Integer => {
                if self.n_integer_reg < self.direction.integer_cap() {
                    let reg = self.n_integer_reg;
                    self.n_integer_reg += 1;
                    VMStorage::IntegerRegister(reg)
                } else {
                    self.stack_alloc()
                }
            }
            StorageKind::Vector => {
                if self.n_vector_reg < self.direction.vector_cap() {
                    let reg = self.n_vector_reg;
                    self.n_vector_reg += 1;
                    VMStorage::VectorRegister(reg)
                } else {
                    self.stack_alloc()
                }
            }
        }
    }

    /// Allocates an 8-byte stack slot. Forbidden for the return direction.
    pub fn stack_alloc(&mut self) -> VMStorage {
        assert_eq!(
            self.direction,
            Direction::Argument,
            "return bindings never allocate stack slots"
        );
        let slot = self.stack_offset;
        self.stack_offset += 1;
        VMStorage::Stack(slot)
    }

    /// Allocates storages for a classified aggregate under the psABI's
    /// all-or-nothing register-fit rule.
    pub fn struct_storages(&mut self, type_class: &TypeClass) -> Vec<VMStorage> {
        let classes = &type_class.classes;

        if classes.iter().any(|&c| c == ArgumentClass::Memory) {
            assert_eq!(
                self.direction,
                Direction::Argument,
                "a MEMORY-classified return value must be redirected to the \
                 hidden-pointer path before reaching struct_storages"
            );
            return (0..classes.len()).map(|_| self.stack_alloc()).collect();
        }

        let need_integer = classes
            .iter()
            .filter(|c| matches!(c, ArgumentClass::Integer | ArgumentClass::Pointer))
            .count() as u8;
        let need_vector = classes
            .iter()
            .filter(|&&c| c == ArgumentClass::Sse)
            .count() as u8;

        let integer_over = self.n_integer_reg + need_integer > self.direction.integer_cap();
        let vector_over = self.n_vector_reg + need_vector > self.direction.vector_cap();

        if integer_over || vector_over {
            log::trace!(
                "aggregate needs {} integer / {} vector register(s), \
                 spilling entire aggregate to the stack",
                need_integer,
                need_vector
            );
            assert_eq!(
                self.direction,
                Direction::Argument,
                "a non-MEMORY-classified return value must already fit the return register caps"
            );
            return (0..classes.len()).map(|_| self.stack_alloc()).collect();
        }

        classes
            .iter()
            .filter_map(|c| match c {
                ArgumentClass::Integer | ArgumentClass::Pointer => {
                    Some(self.next_storage(StorageKind::Integer))
                }
                ArgumentClass::Sse => Some(self.next_storage(StorageKind::Vector)),
                ArgumentClass::SseUp | ArgumentClass::NoClass => None,
                ArgumentClass::X87 | ArgumentClass::X87Up | ArgumentClass::ComplexX87 => {
                    unreachable!("X87-family classes are always forced to MEMORY before reaching storage allocation")
                }
                ArgumentClass::Memory => unreachable!("handled above"),
            })
            .collect()
    }
}
