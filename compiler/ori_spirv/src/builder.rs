//! Word-level SPIR-V module builder.
//!
//! A SPIR-V module has a fixed logical layout: capabilities first, function
//! bodies last. [`SpirvBuilder`] keeps one word buffer per [`Section`], so
//! instructions can be emitted in whatever order generation discovers them
//! and still serialize in layout order. Method generators emit into their
//! own builder and [`merge`](SpirvBuilder::merge) it into the module's.

use smallvec::SmallVec;

use crate::id::SpirvId;
use crate::spirv::{Op, HEADER_WORDS, MAGIC};

/// Logical-layout section of a module, in serialization order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    Capabilities,
    Extensions,
    ExtInstImports,
    MemoryModel,
    EntryPoints,
    ExecutionModes,
    Debug,
    Annotations,
    /// Types, constants, and module-scope variables.
    Declarations,
    Functions,
}

impl Section {
    /// All sections in serialization order.
    pub const ALL: [Section; 10] = [
        Section::Capabilities,
        Section::Extensions,
        Section::ExtInstImports,
        Section::MemoryModel,
        Section::EntryPoints,
        Section::ExecutionModes,
        Section::Debug,
        Section::Annotations,
        Section::Declarations,
        Section::Functions,
    ];

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

/// Operand list of one instruction; most instructions fit inline.
pub type Operands = SmallVec<[u32; 8]>;

/// Module header fields that are not fixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    /// Version word, `(major << 16) | (minor << 8)`.
    pub version: u32,
    /// Generator magic number.
    pub generator: u32,
    /// One past the highest ID used.
    pub bound: u32,
}

impl Header {
    /// The five header words.
    pub fn words(self) -> [u32; HEADER_WORDS] {
        [MAGIC, self.version, self.generator, self.bound, 0]
    }
}

/// Sectioned instruction buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpirvBuilder {
    sections: [Vec<u32>; 10],
}

impl SpirvBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `op` with `operands` to `section`.
    ///
    /// Returns the word offset of the instruction within the section, for
    /// later [`patch`](Self::patch)es of its operands.
    pub fn emit(&mut self, section: Section, op: Op, operands: &[u32]) -> usize {
        let words = &mut self.sections[section.index()];
        let offset = words.len();
        words.push(instruction_word(op, operands.len()));
        words.extend_from_slice(operands);
        offset
    }

    /// Append `op` whose operands contain a literal string:
    /// `leading`, then the encoded `string`, then `trailing`.
    pub fn emit_with_string(
        &mut self,
        section: Section,
        op: Op,
        leading: &[u32],
        string: &str,
        trailing: &[u32],
    ) -> usize {
        let mut operands = Operands::new();
        operands.extend_from_slice(leading);
        operands.extend(encode_string(string));
        operands.extend_from_slice(trailing);
        self.emit(section, op, &operands)
    }

    /// `OpLabel` starting a basic block.
    pub fn generate_op_label(&mut self, label: SpirvId) {
        self.emit(Section::Functions, Op::Label, &[label.raw()]);
    }

    /// Append every section of `other` to the matching section of `self`.
    pub fn merge(&mut self, other: &SpirvBuilder) {
        for (mine, theirs) in self.sections.iter_mut().zip(&other.sections) {
            mine.extend_from_slice(theirs);
        }
    }

    /// Overwrite the word at `offset` of `section`.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is past the end of the section.
    pub fn patch(&mut self, section: Section, offset: usize, word: u32) {
        self.sections[section.index()][offset] = word;
    }

    /// Words of one section.
    pub fn section(&self, section: Section) -> &[u32] {
        &self.sections[section.index()]
    }

    /// Total number of instruction words.
    pub fn word_count(&self) -> usize {
        self.sections.iter().map(Vec::len).sum()
    }

    /// True if nothing has been emitted.
    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(Vec::is_empty)
    }

    /// The complete module: header followed by every section in layout order.
    pub fn serialize(&self, header: Header) -> Vec<u32> {
        let mut words = Vec::with_capacity(HEADER_WORDS + self.word_count());
        words.extend_from_slice(&header.words());
        for section in Section::ALL {
            words.extend_from_slice(self.section(section));
        }
        words
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "SPIR-V word counts are 16-bit; instructions never approach the limit"
)]
fn instruction_word(op: Op, operand_count: usize) -> u32 {
    let word_count = (operand_count + 1) as u32;
    debug_assert!(word_count <= 0xFFFF, "{} has too many operands", op.name());
    (word_count << 16) | u32::from(op as u16)
}

// ── Strings ─────────────────────────────────────────────────────────

/// Encode a literal string: UTF-8, NUL-terminated, padded to a word
/// boundary, packed little-endian.
pub fn encode_string(string: &str) -> Operands {
    let bytes = string.as_bytes();
    // At least one NUL byte, rounded up to whole words.
    let word_count = bytes.len() / 4 + 1;
    let mut words = Operands::with_capacity(word_count);
    for chunk_index in 0..word_count {
        let mut word = [0u8; 4];
        for (i, byte) in word.iter_mut().enumerate() {
            if let Some(&b) = bytes.get(chunk_index * 4 + i) {
                *byte = b;
            }
        }
        words.push(u32::from_le_bytes(word));
    }
    words
}

/// Decode a literal string from the start of `words`.
///
/// Returns the string and the number of words it occupied, or `None` if
/// the words end before the terminating NUL.
pub fn decode_string(words: &[u32]) -> Option<(String, usize)> {
    let mut bytes = Vec::new();
    for (index, word) in words.iter().enumerate() {
        for byte in word.to_le_bytes() {
            if byte == 0 {
                return Some((String::from_utf8_lossy(&bytes).into_owned(), index + 1));
            }
            bytes.push(byte);
        }
    }
    None
}

// ── Instruction stream ──────────────────────────────────────────────

/// One encoded instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction<'a> {
    pub opcode: u16,
    pub operands: &'a [u32],
}

impl Instruction<'_> {
    /// The decoded opcode, if known.
    pub fn op(&self) -> Option<Op> {
        Op::from_u16(self.opcode)
    }
}

/// Iterator over an encoded instruction stream (no header).
///
/// Stops at the end of the stream or at the first malformed instruction
/// (word count of zero, or running past the end); [`rest`](Self::rest)
/// then reports what was left undecoded.
#[derive(Clone, Debug)]
pub struct InstructionIter<'a> {
    words: &'a [u32],
}

impl<'a> InstructionIter<'a> {
    /// Iterate over `words`.
    pub fn new(words: &'a [u32]) -> Self {
        Self { words }
    }

    /// Words not yet decoded.
    pub fn rest(&self) -> &'a [u32] {
        self.words
    }
}

impl<'a> Iterator for InstructionIter<'a> {
    type Item = Instruction<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let &first = self.words.first()?;
        let word_count = (first >> 16) as usize;
        if word_count == 0 || word_count > self.words.len() {
            return None;
        }
        let (instruction, rest) = self.words.split_at(word_count);
        self.words = rest;
        Some(Instruction {
            opcode: u16::try_from(first & 0xFFFF).unwrap_or_default(),
            operands: &instruction[1..],
        })
    }
}
