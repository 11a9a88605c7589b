use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewerError};

pub mod flags
{
    pub const PAIRED: u16 = 0x1;
    pub const PROPER_PAIR: u16 = 0x2;
    pub const UNMAPPED: u16 = 0x4;
    pub const MATE_UNMAPPED: u16 = 0x8;
    pub const REVERSE: u16 = 0x10;
    pub const MATE_REVERSE: u16 = 0x20;
    pub const FIRST_IN_PAIR: u16 = 0x40;
    pub const SECOND_IN_PAIR: u16 = 0x80;
    pub const SECONDARY: u16 = 0x100;
    pub const QC_FAIL: u16 = 0x200;
    pub const DUPLICATE: u16 = 0x400;
}

/// CIGAR operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarOp
{
    Match(usize),       // M: alignment match (can be match or mismatch)
    Insertion(usize),   // I: insertion to reference
    Deletion(usize),    // D: deletion from reference
    Skip(usize),        // N: skipped region (intron)
    SoftClip(usize),    // S: soft clipping
    HardClip(usize),    // H: hard clipping
    Padding(usize),     // P: padding
    SeqMatch(usize),    // =: sequence match
    SeqMismatch(usize), // X: sequence mismatch
}

impl CigarOp
{
    fn from_code(code: char, len: usize) -> Option<Self>
    {
        let op = match code
        {
            'M' => CigarOp::Match(len),
            'I' => CigarOp::Insertion(len),
            'D' => CigarOp::Deletion(len),
            'N' => CigarOp::Skip(len),
            'S' => CigarOp::SoftClip(len),
            'H' => CigarOp::HardClip(len),
            'P' => CigarOp::Padding(len),
            '=' => CigarOp::SeqMatch(len),
            'X' => CigarOp::SeqMismatch(len),
            _ => return None,
        };
        Some(op)
    }
}

/// Parse a CIGAR string such as `3M2I3M`; `*` yields no operations
pub fn parse_cigar(cigar: &str) -> Result<Vec<CigarOp>>
{
    if cigar == "*"
    {
        return Ok(Vec::new());
    }

    let invalid = || ViewerError::InvalidCigar {
        cigar: cigar.to_string(),
    };

    let mut ops = Vec::new();
    let mut run: Option<usize> = None;

    for c in cigar.chars()
    {
        if let Some(digit) = c.to_digit(10)
        {
            let len = run.unwrap_or(0);
            run = Some(
                len.checked_mul(10)
                    .and_then(|len| len.checked_add(digit as usize))
                    .ok_or_else(invalid)?,
            );
            continue;
        }

        let len = run.take().ok_or_else(invalid)?;
        ops.push(CigarOp::from_code(c, len).ok_or_else(invalid)?);
    }

    if run.is_some()
    {
        return Err(invalid());
    }

    Ok(ops)
}

/// One reference-consuming display position of a read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Glyph
{
    Base(u8),
    /// Aligned position with no stored base (`SEQ` is `*`)
    Unknown,
    Deletion,
    Skip,
}

impl Glyph
{
    pub fn as_char(&self) -> char
    {
        match self
        {
            Glyph::Base(b) => *b as char,
            Glyph::Unknown => '=',
            Glyph::Deletion => '-',
            Glyph::Skip => '>',
        }
    }
}

/// Bases inserted between two reference positions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insertion
{
    /// Index into the expanded sequence before which the bases sit
    pub offset: usize,
    pub bases: Vec<u8>,
}

/// Expanded read: reference-consuming glyphs plus insertion points
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandedSequence
{
    pub glyphs: Vec<Glyph>,
    pub insertions: Vec<Insertion>,
}

/// Walk the CIGAR over the read bases.
///
/// `M`, `=` and `X` take one base each, `D` and `N` add placeholders, `I` and
/// `S` take bases without adding glyphs.
pub fn expand_cigar(cigar: &[CigarOp], seq: &[u8]) -> ExpandedSequence
{
    let mut expanded = ExpandedSequence::default();
    let mut read_pos = 0;

    for op in cigar
    {
        match *op
        {
            CigarOp::Match(len) | CigarOp::SeqMatch(len) | CigarOp::SeqMismatch(len) =>
            {
                for i in 0..len
                {
                    let glyph = seq
                        .get(read_pos + i)
                        .map(|&b| Glyph::Base(b))
                        .unwrap_or(Glyph::Unknown);
                    expanded.glyphs.push(glyph);
                }
                read_pos += len;
            }
            CigarOp::Insertion(len) =>
            {
                let end = (read_pos + len).min(seq.len());
                let bases = seq.get(read_pos.min(end)..end).unwrap_or_default().to_vec();
                expanded.insertions.push(Insertion {
                    offset: expanded.glyphs.len(),
                    bases,
                });
                read_pos += len;
            }
            CigarOp::Deletion(len) =>
            {
                expanded.glyphs.extend(std::iter::repeat(Glyph::Deletion).take(len));
            }
            CigarOp::Skip(len) =>
            {
                expanded.glyphs.extend(std::iter::repeat(Glyph::Skip).take(len));
            }
            CigarOp::SoftClip(len) =>
            {
                read_pos += len;
            }
            CigarOp::HardClip(_) | CigarOp::Padding(_) =>
            {}
        }
    }

    expanded
}

/// Typed value of an optional SAM tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue
{
    Int(i64),
    Float(f64),
    String(String),
}

/// Strand of the read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strand
{
    Forward,
    Reverse,
}

/// Single alignment record with pre-computed display fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentRecord
{
    pub qname: String,
    pub flag: u16,
    pub rname: String,
    pub pos: u64, // 1-based
    pub mapq: u8,
    pub cigar: String,
    pub rnext: String,
    pub pnext: u64,
    pub tlen: i64,
    pub seq: String,
    pub qual: String,
    pub tags: BTreeMap<String, TagValue>,
    pub parsed_seq: Vec<Glyph>,
    pub insertions: Vec<Insertion>,
    pub duplicate_count: u32,
    pub assigned_row: Option<usize>,
}

impl AlignmentRecord
{
    pub fn is_paired(&self) -> bool
    {
        (self.flag & flags::PAIRED) != 0
    }

    pub fn is_proper_pair(&self) -> bool
    {
        (self.flag & flags::PROPER_PAIR) != 0
    }

    pub fn is_mapped(&self) -> bool
    {
        !self.query_unmapped()
    }

    pub fn query_unmapped(&self) -> bool
    {
        (self.flag & flags::UNMAPPED) != 0
    }

    pub fn mate_unmapped(&self) -> bool
    {
        (self.flag & flags::MATE_UNMAPPED) != 0
    }

    pub fn strand_forward(&self) -> bool
    {
        (self.flag & flags::REVERSE) == 0
    }

    pub fn mate_strand_forward(&self) -> bool
    {
        (self.flag & flags::MATE_REVERSE) == 0
    }

    pub fn first_in_pair(&self) -> bool
    {
        (self.flag & flags::FIRST_IN_PAIR) != 0
    }

    pub fn second_in_pair(&self) -> bool
    {
        (self.flag & flags::SECOND_IN_PAIR) != 0
    }

    pub fn is_primary(&self) -> bool
    {
        (self.flag & flags::SECONDARY) == 0
    }

    pub fn failed_quality(&self) -> bool
    {
        (self.flag & flags::QC_FAIL) != 0
    }

    pub fn is_duplicate(&self) -> bool
    {
        (self.flag & flags::DUPLICATE) != 0
    }

    pub fn strand(&self) -> Strand
    {
        if self.strand_forward()
        {
            Strand::Forward
        }
        else
        {
            Strand::Reverse
        }
    }

    /// Read name with the `/1` or `/2` pair suffix
    pub fn full_id(&self) -> String
    {
        if self.first_in_pair()
        {
            format!("{}/1", self.qname)
        }
        else if self.second_in_pair()
        {
            format!("{}/2", self.qname)
        }
        else
        {
            self.qname.clone()
        }
    }

    /// Number of reference positions drawn, at least one
    pub fn display_length(&self) -> u64
    {
        (self.parsed_seq.len() as u64).max(1)
    }

    /// Last reference position covered (inclusive)
    pub fn end(&self) -> u64
    {
        self.pos + self.display_length() - 1
    }

    pub fn tag(&self, name: &str) -> Option<&TagValue>
    {
        self.tags.get(name)
    }
}
