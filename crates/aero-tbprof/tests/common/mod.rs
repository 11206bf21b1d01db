#![allow(dead_code)]

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use aero_tbprof::{BlockHandle, HostRuntime, InsnView, OutputSink, Symbol, TranslatedBlock};

/// In-memory block with `n` fixed-width instructions.
#[derive(Debug, Clone)]
pub struct TestBlock {
    pub vaddr: u64,
    pub insns: Vec<(Vec<u8>, Option<String>)>,
    pub symbol: Option<Symbol>,
}

impl TestBlock {
    pub fn new(vaddr: u64, n: usize) -> Self {
        let insns = (0..n)
            .map(|i| (vec![0x13, 0x05, i as u8, 0x00], Some(format!("addi a0,a0,{i}"))))
            .collect();
        Self {
            vaddr,
            insns,
            symbol: None,
        }
    }

    pub fn with_symbol(mut self, name: &str, offset: u64) -> Self {
        self.symbol = Some(Symbol {
            name: name.to_string(),
            offset,
        });
        self
    }
}

impl TranslatedBlock for TestBlock {
    fn vaddr(&self) -> u64 {
        self.vaddr
    }

    fn n_insns(&self) -> usize {
        self.insns.len()
    }

    fn insn(&self, index: usize) -> InsnView<'_> {
        let (bytes, disas) = &self.insns[index];
        InsnView {
            bytes: Cow::Borrowed(bytes),
            disas: disas.as_deref().map(Cow::Borrowed),
        }
    }

    fn symbol(&self) -> Option<Symbol> {
        self.symbol.clone()
    }
}

/// Host that remembers the handle registered for each address and captures `outs` text.
#[derive(Debug, Default)]
pub struct TestHost {
    pub registered: HashMap<u64, BlockHandle>,
    pub registrations: usize,
    pub out: String,
}

impl HostRuntime for TestHost {
    type Block = TestBlock;

    fn register_exec_counter(&mut self, block: &TestBlock, handle: BlockHandle) {
        self.registrations += 1;
        self.registered.insert(block.vaddr, handle);
    }

    fn outs(&mut self, text: &str) {
        self.out.push_str(text);
    }
}

impl TestHost {
    pub fn handle(&self, vaddr: u64) -> BlockHandle {
        Arc::clone(&self.registered[&vaddr])
    }
}

/// Clonable in-memory writer for inspecting sink contents after the profiler closed them.
#[derive(Debug, Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn sink(&self, label: &'static str) -> OutputSink {
        OutputSink::new(label, self.clone())
    }

    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Parse BBV text into `(id, count)` pairs per line.
pub fn parse_bbv(text: &str) -> Vec<Vec<(u64, u64)>> {
    text.lines()
        .map(|line| {
            let rest = line.strip_prefix('T').expect("BBV line must start with T");
            rest.split_whitespace()
                .map(|pair| {
                    let mut parts = pair.trim_start_matches(':').split(':');
                    let id = parts.next().unwrap().parse().unwrap();
                    let count = parts.next().unwrap().parse().unwrap();
                    assert!(parts.next().is_none(), "malformed pair {pair:?}");
                    (id, count)
                })
                .collect()
        })
        .collect()
}

pub fn line_total(line: &[(u64, u64)]) -> u64 {
    line.iter().map(|(_, count)| count).sum()
}
