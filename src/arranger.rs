//! Top-level orchestrator: `arrange_downcall` / `arrange_upcall` (spec §4.5).

use crate::abi::AbiDescriptor;
use crate::binding::{self, Binding, CarrierType};
use crate::class::ArgumentClass;
use crate::classify;
use crate::error::CallArrangerError;
use crate::layout::MemoryLayout;
use crate::storage::{Direction, StorageCalculator, VMStorage};
use crate::util::DurationDisplay;

/// The arity/return-presence shape of the host-language call site.
#[derive(Debug, Clone, Copy)]
pub struct HostSignature {
    pub arg_count: usize,
    pub has_return: bool,
}

/// The C-side function signature: argument layouts plus an optional return layout.
#[derive(Debug, Clone)]
pub struct CDescriptor {
    pub args: Vec<MemoryLayout>,
    pub ret: Option<MemoryLayout>,
}

/// Opaque handle to the host callback an upcall should invoke. The actual
/// method-handle/closure dispatch is an external collaborator, out of
/// scope per spec.md's Non-goals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpcallTarget(pub u64);

/// The finished, immutable calling sequence for one call site.
#[derive(Debug, Clone)]
pub struct CallingSequence {
    pub arguments: Vec<Vec<Binding>>,
    pub ret_bindings: Option<Vec<Binding>>,
    pub returns_in_memory: bool,
    /// The count of vector registers consumed by `arguments`, i.e. the
    /// value the trailing `Move(VectorCountRegister, ..)` binding must
    /// carry into `rax`/AL for a variadic call (spec §4.5 step 6).
    pub vector_arg_count: u8,
}

/// A downcall call-site artifact: a native address plus its calling sequence.
#[derive(Debug, Clone)]
pub struct CallHandle {
    pub address: u64,
    pub abi: &'static AbiDescriptor,
    pub sequence: CallingSequence,
}

/// An upcall call-site artifact: the host target plus its calling sequence.
#[derive(Debug, Clone)]
pub struct UpcallHandler {
    pub target: UpcallTarget,
    pub abi: &'static AbiDescriptor,
    pub sequence: CallingSequence,
}

fn check_preconditions(
    host_sig: &HostSignature,
    c_desc: &CDescriptor,
) -> Result<(), CallArrangerError> {
    if host_sig.arg_count != c_desc.args.len() {
        return Err(CallArrangerError::ArityMismatch {
            host_arity: host_sig.arg_count,
            c_arity: c_desc.args.len(),
        });
    }
    if host_sig.has_return != c_desc.ret.is_some() {
        return Err(CallArrangerError::ReturnPresenceMismatch {
            host_has_return: host_sig.has_return,
            c_has_return: c_desc.ret.is_some(),
        });
    }
    Ok(())
}

/// True iff `ret_layout` classifies with any MEMORY eightbyte — the
/// in-memory-return (IMR) condition from spec §4.5.
fn is_in_memory_return(ret_layout: &MemoryLayout) -> Result<bool, CallArrangerError> {
    if !matches!(ret_layout, MemoryLayout::Group { .. }) {
        return Ok(false);
    }
    let classes = classify::classify_type(ret_layout)?;
    Ok(classes.iter().any(|&c| c == ArgumentClass::Memory))
}

/// Builds the calling sequence for a call from the host runtime into
/// native code at `addr`.
pub fn arrange_downcall(
    addr: u64,
    host_sig: &HostSignature,
    c_desc: &CDescriptor,
    abi: &'static AbiDescriptor,
) -> Result<CallHandle, CallArrangerError> {
    let timer = std::time::Instant::now();
    check_preconditions(host_sig, c_desc)?;

    let mut arg_calc = StorageCalculator::new(Direction::Argument);
    let mut ret_calc = StorageCalculator::new(Direction::Return);

    let mut arguments = Vec::with_capacity(c_desc.args.len() + 2);
    let mut ret_bindings = None;
    let mut returns_in_memory = false;

    if let Some(ret_layout) = &c_desc.ret {
        if is_in_memory_return(ret_layout)? {
            returns_in_memory = true;
            let ptr_layout = MemoryLayout::pointer();
            let ptr_type_class = classify::classify_layout(&ptr_layout)?;
            arguments.push(binding::unbox_bindings(&ptr_layout, &ptr_type_class, &mut arg_calc));
        } else {
            let ret_type_class = classify::classify_layout(ret_layout)?;
            ret_bindings = Some(binding::box_bindings(ret_layout, &ret_type_class, &mut ret_calc));
        }
    }

    for arg_layout in &c_desc.args {
        let type_class = classify::classify_layout(arg_layout)?;
        arguments.push(binding::unbox_bindings(arg_layout, &type_class, &mut arg_calc));
    }

    arguments.push(vec![Binding::Move(
        VMStorage::VectorCountRegister,
        CarrierType::I64,
    )]);

    let vector_arg_count = arg_calc.n_vector_reg();

    log::debug!(
        "arranged downcall to 0x{:x} in {} ({} vector register(s) used)",
        addr,
        DurationDisplay(timer.elapsed()),
        vector_arg_count
    );

    Ok(CallHandle {
        address: addr,
        abi,
        sequence: CallingSequence {
            arguments,
            ret_bindings,
            returns_in_memory,
            vector_arg_count,
        },
    })
}

/// Builds the calling sequence for a native call back into `target`.
///
/// Symmetric to `arrange_downcall`: arguments are boxed (native storage →
/// host value) and the return is unboxed (host value → native storage). If
/// the return is in-memory, the target's returned buffer is understood by
/// the (external) invoker to be copied into the caller-provided destination.
pub fn arrange_upcall(
    target: UpcallTarget,
    host_sig: &HostSignature,
    c_desc: &CDescriptor,
    abi: &'static AbiDescriptor,
) -> Result<UpcallHandler, CallArrangerError> {
    let timer = std::time::Instant::now();
    check_preconditions(host_sig, c_desc)?;

    let mut arg_calc = StorageCalculator::new(Direction::Argument);
    let mut ret_calc = StorageCalculator::new(Direction::Return);

    let mut arguments = Vec::with_capacity(c_desc.args.len() + 1);
    let mut ret_bindings = None;
    let mut returns_in_memory = false;

    if let Some(ret_layout) = &c_desc.ret {
        if is_in_memory_return(ret_layout)? {
            returns_in_memory = true;
            let ptr_layout = MemoryLayout::pointer();
            let ptr_type_class = classify::classify_layout(&ptr_layout)?;
            arguments.push(binding::box_bindings(&ptr_layout, &ptr_type_class, &mut arg_calc));
        } else {
            let ret_type_class = classify::classify_layout(ret_layout)?;
            ret_bindings = Some(binding::unbox_bindings(ret_layout, &ret_type_class, &mut ret_calc));
        }
    }

    for arg_layout in &c_desc.args {
        let type_class = classify::classify_layout(arg_layout)?;
        arguments.push(binding::box_bindings(arg_layout, &type_class, &mut arg_calc));
    }

    let vector_arg_count = arg_calc.n_vector_reg();

    log::debug!(
        "arranged upcall to target {:?} in {} ({} vector register(s) used)",
        target,
        DurationDisplay(timer.elapsed()),
        vector_arg_count
    );

    Ok(UpcallHandler {
        target,
        abi,
        sequence: CallingSequence {
            arguments,
            ret_bindings,
            returns_in_memory,
            vector_arg_count,
        },
    })
}
