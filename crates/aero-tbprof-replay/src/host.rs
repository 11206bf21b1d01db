use std::borrow::Cow;
use std::io::Write;
use std::sync::Arc;

use aero_tbprof::{BlockHandle, HostRuntime, InsnView, Symbol, TranslatedBlock};
use rustc_hash::FxHashMap;

use crate::disasm::{disassemble, Arch};
use crate::trace::TraceInsn;

/// A block rebuilt from a `translate` event.
#[derive(Debug, Clone)]
pub struct ReplayBlock {
    vaddr: u64,
    insns: Vec<TraceInsn>,
    symbol: Option<Symbol>,
}

impl ReplayBlock {
    /// Fill in missing disassembly from the raw bytes when `arch` has a decoder.
    pub fn new(
        arch: &Arch,
        vaddr: u64,
        mut insns: Vec<TraceInsn>,
        symbol: Option<String>,
        symbol_offset: Option<u64>,
    ) -> Self {
        if let Some(bitness) = arch.bitness() {
            let mut ip = vaddr;
            for insn in &mut insns {
                if insn.disas.is_none() {
                    insn.disas = disassemble(bitness, &insn.bytes, ip).map(|(text, _)| text);
                }
                ip = ip.wrapping_add(insn.bytes.len() as u64);
            }
        }

        Self {
            vaddr,
            insns,
            symbol: symbol.map(|name| Symbol {
                name,
                offset: symbol_offset.unwrap_or(0),
            }),
        }
    }
}

impl TranslatedBlock for ReplayBlock {
    fn vaddr(&self) -> u64 {
        self.vaddr
    }

    fn n_insns(&self) -> usize {
        self.insns.len()
    }

    fn insn(&self, index: usize) -> InsnView<'_> {
        let insn = &self.insns[index];
        InsnView {
            bytes: Cow::Borrowed(&insn.bytes),
            disas: insn.disas.as_deref().map(Cow::Borrowed),
        }
    }

    fn symbol(&self) -> Option<Symbol> {
        self.symbol.clone()
    }
}

/// Host runtime backed by a trace: "registering" an execution callback just remembers the
/// handle so later `exec` events can be dispatched to it.
#[derive(Debug)]
pub struct ReplayHost<W> {
    arch: Arch,
    handles: FxHashMap<u64, BlockHandle>,
    out: W,
    out_failed: bool,
}

impl<W: Write> ReplayHost<W> {
    pub fn new(out: W) -> Self {
        Self {
            arch: Arch::default(),
            handles: FxHashMap::default(),
            out,
            out_failed: false,
        }
    }

    pub fn arch(&self) -> &Arch {
        &self.arch
    }

    pub fn set_arch(&mut self, arch: Arch) {
        self.arch = arch;
    }

    pub fn handle(&self, vaddr: u64) -> Option<BlockHandle> {
        self.handles.get(&vaddr).map(Arc::clone)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> HostRuntime for ReplayHost<W> {
    type Block = ReplayBlock;

    fn register_exec_counter(&mut self, block: &ReplayBlock, handle: BlockHandle) {
        self.handles.insert(block.vaddr, handle);
    }

    fn outs(&mut self, text: &str) {
        if self.out_failed {
            return;
        }
        if let Err(err) = self.out.write_all(text.as_bytes()).and_then(|()| self.out.flush()) {
            tracing::warn!("host output failed: {err}");
            self.out_failed = true;
        }
    }
}
