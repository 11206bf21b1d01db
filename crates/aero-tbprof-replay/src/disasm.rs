//! x86 disassembly for traces that record raw bytes only.

use iced_x86::{Decoder, DecoderOptions, Formatter, IntelFormatter};

/// Guest architecture named by the trace header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Arch {
    X86_64,
    X86,
    /// Any other ISA. Instructions without host disassembly fall back to `.byte` rendering.
    #[default]
    Other,
}

impl Arch {
    pub fn from_name(name: &str) -> Self {
        match name {
            "x86_64" | "amd64" => Self::X86_64,
            "x86" | "i386" | "i686" => Self::X86,
            _ => Self::Other,
        }
    }

    /// Decoder bitness, or `None` when iced-x86 cannot decode this ISA.
    pub fn bitness(&self) -> Option<u32> {
        match self {
            Self::X86_64 => Some(64),
            Self::X86 => Some(32),
            Self::Other => None,
        }
    }
}

/// Decode one instruction at `ip` and format it in Intel syntax.
///
/// Returns the text and the decoded length, or `None` for invalid or truncated encodings.
pub fn disassemble(bitness: u32, bytes: &[u8], ip: u64) -> Option<(String, usize)> {
    let mut decoder = Decoder::with_ip(bitness, bytes, ip, DecoderOptions::NONE);
    let instruction = decoder.decode();
    if instruction.is_invalid() {
        return None;
    }

    let mut formatter = IntelFormatter::new();
    let mut text = String::new();
    formatter.format(&instruction, &mut text);
    Some((text, instruction.len()))
}
