//! Binding calculators: unbox (host → native storage) and box (native
//! storage → host), spec §4.3–4.4.

use crate::class::{TypeClass, TypeClassKind};
use crate::layout::MemoryLayout;
use crate::storage::{StorageCalculator, StorageKind};

/// The shape of the host-side value a `Move` binding carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarrierType {
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Address,
}

/// A primitive data-movement instruction.
#[derive(Debug, Clone)]
pub enum Binding {
    Move(crate::storage::VMStorage, CarrierType),
    Dereference(crate::storage::VMStorage, u64, u8),
    BoxAddress,
    AllocateBuffer(MemoryLayout),
}

fn integer_carrier(byte_size: u64, chunk_index: usize, chunk_count: usize) -> CarrierType {
    if chunk_count > 1 {
        // Every eightbyte of a multi-eightbyte scalar (e.g. `__int128`) is
        // a full 8 bytes by construction; only the single-chunk case needs
        // the narrower carrier widths.
        let _ = chunk_index;
        return CarrierType::I64;
    }
    match byte_size {
        1 => CarrierType::I8,
        2 => CarrierType::I16,
        4 => CarrierType::I32,
        _ => CarrierType::I64,
    }
}

fn float_carrier(byte_size: u64) -> CarrierType {
    if byte_size <= 4 {
        CarrierType::F32
    } else {
        CarrierType::F64
    }
}

/// Host value → native storage. Used for downcall arguments and upcall returns.
pub fn unbox_bindings(
    layout: &MemoryLayout,
    type_class: &TypeClass,
    calc: &mut StorageCalculator,
) -> Vec<Binding> {
    match type_class.kind {
        TypeClassKind::Pointer => vec![
            Binding::BoxAddress,
            Binding::Move(calc.next_storage(StorageKind::Integer), CarrierType::I64),
        ],
        TypeClassKind::Integer => {
            let count = type_class.classes.len();
            (0..count)
                .map(|i| {
                    Binding::Move(
                        calc.next_storage(StorageKind::Integer),
                        integer_carrier(layout.byte_size(), i, count),
                    )
                })
                .collect()
        }
        TypeClassKind::Float => vec![Binding::Move(
            calc.next_storage(StorageKind::Vector),
            float_carrier(layout.byte_size()),
        )],
        TypeClassKind::Struct => {
            let storages = calc.struct_storages(type_class);
            dereference_chunks(layout.byte_size(), storages)
        }
    }
}

/// Native storage → host value. Used for downcall returns and upcall arguments.
pub fn box_bindings(
    layout: &MemoryLayout,
    type_class: &TypeClass,
    calc: &mut StorageCalculator,
) -> Vec<Binding> {
    match type_class.kind {
        TypeClassKind::Pointer => vec![
            Binding::Move(calc.next_storage(StorageKind::Integer), CarrierType::I64),
            Binding::BoxAddress,
        ],
        TypeClassKind::Integer => {
            let count = type_class.classes.len();
            (0..count)
                .map(|i| {
                    Binding::Move(
                        calc.next_storage(StorageKind::Integer),
                        integer_carrier(layout.byte_size(), i, count),
                    )
                })
                .collect()
        }
        TypeClassKind::Float => vec![Binding::Move(
            calc.next_storage(StorageKind::Vector),
            float_carrier(layout.byte_size()),
        )],
        TypeClassKind::Struct => {
            let storages = calc.struct_storages(type_class);
            let mut bindings = Vec::with_capacity(storages.len() + 1);
            bindings.push(Binding::AllocateBuffer(layout.clone()));
            bindings.extend(dereference_chunks(layout.byte_size(), storages));
            bindings
        }
    }
}

fn dereference_chunks(byte_size: u64, storages: Vec<crate::storage::VMStorage>) -> Vec<Binding> {
    let mut bindings = Vec::with_capacity(storages.len());
    let mut offset = 0u64;
    for storage in storages {
        let chunk = std::cmp::min(8, byte_size.saturating_sub(offset)) as u8;
        bindings.push(Binding::Dereference(storage, offset, chunk));
        offset += 8;
    }
    bindings
}
