//! The System V AMD64 `ABIDescriptor` constants (spec §4.5).

/// Register-file configuration an invoker needs to actually load registers
/// and perform the call. Building and executing against this descriptor is
/// an external collaborator's responsibility; this crate only produces the
/// calling sequence that is meant to run against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbiDescriptor {
    pub integer_arg_regs: &'static [&'static str],
    pub vector_arg_regs: &'static [&'static str],
    pub integer_return_regs: &'static [&'static str],
    pub vector_return_regs: &'static [&'static str],
    pub volatile_integer_regs: &'static [&'static str],
    pub volatile_vector_regs: &'static [&'static str],
    pub vector_count_scratch_reg: &'static str,
    pub stack_alignment: u32,
    pub shadow_space: u32,
}

pub static SYSV_AMD64: AbiDescriptor = AbiDescriptor {
    integer_arg_regs: &["rdi", "rsi", "rdx", "rcx", "r8", "r9"],
    vector_arg_regs: &[
        "xmm0", "xmm1", "xmm2", "xmm3", "xmm4", "xmm5", "xmm6", "xmm7",
    ],
    integer_return_regs: &["rax", "rdx"],
    vector_return_regs: &["xmm0", "xmm1"],
    volatile_integer_regs: &["r10", "r11"],
    volatile_vector_regs: &[
        "xmm8", "xmm9", "xmm10", "xmm11", "xmm12", "xmm13", "xmm14", "xmm15",
    ],
    vector_count_scratch_reg: "rax",
    stack_alignment: 16,
    shadow_space: 0,
};

#[cfg(test)]
mod test {
    use super::SYSV_AMD64;

    #[test]
    fn register_file_sizes_match_the_psabi() {
        assert_eq!(SYSV_AMD64.integer_arg_regs.len(), 6);
        assert_eq!(SYSV_AMD64.vector_arg_regs.len(), 8);
        assert_eq!(SYSV_AMD64.integer_return_regs.len(), 2);
        assert_eq!(SYSV_AMD64.vector_return_regs.len(), 2);
        assert_eq!(SYSV_AMD64.stack_alignment, 16);
        assert_eq!(SYSV_AMD64.shadow_space, 0);
        assert_eq!(SYSV_AMD64.vector_count_scratch_reg, "rax");
    }
}
