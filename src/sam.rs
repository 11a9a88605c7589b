//! Line-oriented SAM text parsing.
//!
//! Bad lines never abort a batch: each one is logged and skipped.

use std::collections::BTreeMap;
use std::str::FromStr;

use log::warn;

use crate::alignment::{expand_cigar, parse_cigar, AlignmentRecord, TagValue};
use crate::error::{Result, ViewerError};

const MANDATORY_FIELDS: usize = 11;

/// Records parsed from one block of SAM text
#[derive(Debug, Default)]
pub struct ParsedBatch
{
    pub records: Vec<AlignmentRecord>,
    pub skipped: usize,
}

fn parse_number<T: FromStr>(field: &str, value: &str) -> Result<T>
{
    value.parse::<T>().map_err(|_| ViewerError::InvalidField {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Parse one SAM line:
///
/// ```text
/// QNAME FLAG RNAME POS MAPQ CIGAR RNEXT PNEXT TLEN SEQ QUAL [TAG:TYPE:VALUE ...]
/// ```
pub fn parse_sam_line(line: &str) -> Result<AlignmentRecord>
{
    let fields: Vec<&str> = line.trim_end_matches(&['\r', '\n'][..]).split('\t').collect();

    if fields.len() < MANDATORY_FIELDS
    {
        return Err(ViewerError::MalformedRecord {
            fields: fields.len(),
        });
    }

    let flag: u16 = parse_number("FLAG", fields[1])?;
    let pos: u64 = parse_number("POS", fields[3])?;
    let mapq: u8 = parse_number("MAPQ", fields[4])?;
    let pnext: u64 = parse_number("PNEXT", fields[7])?;
    let tlen: i64 = parse_number("TLEN", fields[8])?;

    let cigar = parse_cigar(fields[5])?;
    let seq = fields[9];
    let bases: &[u8] = if seq == "*" { &[] } else { seq.as_bytes() };
    let expanded = expand_cigar(&cigar, bases);

    let mut tags = BTreeMap::new();
    for token in &fields[MANDATORY_FIELDS..]
    {
        let parts: Vec<&str> = token.splitn(3, ':').collect();
        if parts.len() < 3
        {
            warn!("Ignoring malformed tag '{}' on read {}", token, fields[0]);
            continue;
        }

        let value = match parts[1]
        {
            "i" => parse_number(parts[0], parts[2]).map(TagValue::Int),
            "f" => parse_number(parts[0], parts[2]).map(TagValue::Float),
            _ => Ok(TagValue::String(parts[2].to_string())),
        };
        match value
        {
            Ok(value) =>
            {
                tags.insert(parts[0].to_string(), value);
            }
            Err(e) => warn!("Ignoring tag '{}' on read {}: {}", token, fields[0], e),
        }
    }

    Ok(AlignmentRecord {
        qname: fields[0].to_string(),
        flag,
        rname: fields[2].to_string(),
        pos,
        mapq,
        cigar: fields[5].to_string(),
        rnext: fields[6].to_string(),
        pnext,
        tlen,
        seq: seq.to_string(),
        qual: fields[10].to_string(),
        tags,
        parsed_seq: expanded.glyphs,
        insertions: expanded.insertions,
        duplicate_count: 1,
        assigned_row: None,
    })
}

/// Parse a block of SAM text, skipping headers, blank lines and bad records
pub fn parse_sam(text: &str) -> ParsedBatch
{
    let mut batch = ParsedBatch::default();

    for (line_num, line) in text.lines().enumerate()
    {
        if line.trim().is_empty() || line.starts_with('@')
        {
            continue;
        }

        match parse_sam_line(line)
        {
            Ok(record) => batch.records.push(record),
            Err(e) =>
            {
                warn!("Skipping SAM line {}: {}", line_num + 1, e);
                batch.skipped += 1;
            }
        }
    }

    batch
}
