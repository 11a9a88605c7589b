use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use crate::alignment::AlignmentRecord;
use crate::region::Region;

/// Result of offering a record to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome
{
    Inserted,
    /// Same position and sequence (or same read) already stored; its count was bumped
    Duplicate,
    /// Unmapped reads are not indexed
    Unmapped,
}

/// Alignment records indexed by their 1-based anchor position.
///
/// Records at one position keep their insertion order, which together with the
/// position ordering gives the deterministic order the row packer relies on.
#[derive(Debug, Default)]
pub struct AlignmentStore
{
    positions: BTreeMap<u64, Vec<AlignmentRecord>>,
    len: usize,
}

impl AlignmentStore
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn len(&self) -> usize
    {
        self.len
    }

    pub fn is_empty(&self) -> bool
    {
        self.len == 0
    }

    pub fn clear(&mut self)
    {
        self.positions.clear();
        self.len = 0;
    }

    /// Index a record, collapsing PCR duplicates.
    ///
    /// The duplicate key is `(position, raw sequence)`; a record whose full id
    /// is already present at the position is also treated as a repeat.
    pub fn insert(&mut self, record: AlignmentRecord) -> InsertOutcome
    {
        if !record.is_mapped()
        {
            return InsertOutcome::Unmapped;
        }

        let full_id = record.full_id();
        let records = self.positions.entry(record.pos).or_default();

        if let Some(existing) = records
            .iter_mut()
            .find(|r| r.seq == record.seq || r.full_id() == full_id)
        {
            existing.duplicate_count += 1;
            return InsertOutcome::Duplicate;
        }

        records.push(record);
        self.len += 1;
        InsertOutcome::Inserted
    }

    pub fn get(&self, pos: u64, full_id: &str) -> Option<&AlignmentRecord>
    {
        self.positions
            .get(&pos)?
            .iter()
            .find(|r| r.full_id() == full_id)
    }

    /// Records anchored at each position of the range
    pub fn query(&self, positions: RangeInclusive<u64>) -> impl Iterator<Item = &AlignmentRecord>
    {
        self.positions.range(positions).flat_map(|(_, records)| records.iter())
    }

    /// Records whose footprint overlaps the window.
    ///
    /// Reads can start before the window, so the scan begins `margin` bases
    /// before `window.start`.
    pub fn overlapping(&self, window: &Region, margin: u64) -> Vec<&AlignmentRecord>
    {
        self.query(window.start.saturating_sub(margin)..=window.end)
            .filter(|r| r.rname == window.chromosome && r.end() >= window.start)
            .collect()
    }

    pub fn overlapping_mut(&mut self, window: &Region, margin: u64) -> Vec<&mut AlignmentRecord>
    {
        self.positions
            .range_mut(window.start.saturating_sub(margin)..=window.end)
            .flat_map(|(_, records)| records.iter_mut())
            .filter(|r| r.rname == window.chromosome && r.end() >= window.start)
            .collect()
    }

    /// Forget every row assignment
    pub fn clear_rows(&mut self)
    {
        for record in self.positions.values_mut().flatten()
        {
            record.assigned_row = None;
        }
    }

    /// Drop records that do not overlap `keep`, returning how many were removed
    pub fn evict_outside(&mut self, keep: &Region, margin: u64) -> usize
    {
        let before = self.len;
        let lower = keep.start.saturating_sub(margin);

        self.positions.retain(|&pos, records| {
            if pos < lower || pos > keep.end
            {
                return false;
            }
            records.retain(|r| r.rname == keep.chromosome && r.end() >= keep.start);
            !records.is_empty()
        });

        self.len = self.positions.values().map(Vec::len).sum();
        before - self.len
    }
}
