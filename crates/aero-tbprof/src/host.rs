//! Capability surface the profiler needs from the host JIT.
//!
//! The engine only assumes that a block is translated before it first executes, and that
//! execution notifications are delivered through the handle registered at translation time.

use std::borrow::Cow;

use crate::store::BlockHandle;

/// Best-effort symbol attribution for a guest address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub offset: u64,
}

/// One guest instruction of a translated block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsnView<'a> {
    pub bytes: Cow<'a, [u8]>,
    /// Host-provided disassembly, if the host has a disassembler for the guest ISA.
    pub disas: Option<Cow<'a, str>>,
}

/// A block handed to the translation hook.
pub trait TranslatedBlock {
    fn vaddr(&self) -> u64;
    fn n_insns(&self) -> usize;
    fn insn(&self, index: usize) -> InsnView<'_>;
    /// Symbol covering the first instruction of the block.
    fn symbol(&self) -> Option<Symbol>;
}

pub trait HostRuntime {
    type Block: TranslatedBlock + ?Sized;

    /// Arrange for [`crate::Profiler::on_exec`] to be called with `handle` every time `block`
    /// executes.
    fn register_exec_counter(&mut self, block: &Self::Block, handle: BlockHandle);

    /// Host text output channel (used for the ranking report when no report file is set).
    fn outs(&mut self, text: &str);
}
