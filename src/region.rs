use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ViewerError;

/// Contiguous 1-based inclusive interval on one chromosome
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region
{
    pub chromosome: String,
    pub start: u64,
    pub end: u64,
}

impl Region
{
    pub fn new(chromosome: impl Into<String>, start: u64, end: u64) -> Self
    {
        Self {
            chromosome: chromosome.into(),
            start,
            end,
        }
    }

    /// Number of bases covered
    pub fn len(&self) -> u64
    {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn is_empty(&self) -> bool
    {
        self.end < self.start
    }

    pub fn overlaps(&self, other: &Region) -> bool
    {
        self.chromosome == other.chromosome && self.start <= other.end && other.start <= self.end
    }

    /// True when `other` fully contains this region
    pub fn subset(&self, other: &Region) -> bool
    {
        self.chromosome == other.chromosome && self.start >= other.start && self.end <= other.end
    }

    pub fn union(&self, other: &Region) -> Region
    {
        Region::new(
            self.chromosome.clone(),
            self.start.min(other.start),
            self.end.max(other.end),
        )
    }

    /// Part of `other` not covered by this region, `None` when fully covered.
    ///
    /// Only one side is ever trimmed: when `other` overhangs on both sides the
    /// right overhang is returned and the left one is lost. Edge bases are
    /// included in the result.
    pub fn complement(&self, other: &Region) -> Option<Region>
    {
        if !self.overlaps(other)
        {
            return Some(other.clone());
        }
        if other.subset(self)
        {
            return None;
        }
        if other.start < self.start && other.end <= self.end
        {
            return Some(Region::new(other.chromosome.clone(), other.start, self.start));
        }
        Some(Region::new(other.chromosome.clone(), self.end, other.end))
    }

    /// Grows both ends by `size`, keeping `start >= 1`
    pub fn expand_flanking(&self, size: u64) -> Region
    {
        Region::new(
            self.chromosome.clone(),
            self.start.saturating_sub(size).max(1),
            self.end.saturating_add(size),
        )
    }

    pub fn middle(&self) -> u64
    {
        self.start + (self.end - self.start) / 2
    }

    /// Translates both bounds; a shift past base 1 stops at 1 and keeps the width
    pub fn shift(&self, delta: i64) -> Region
    {
        let width = self.end - self.start;
        let start = self.start.saturating_add_signed(delta).max(1);
        Region::new(self.chromosome.clone(), start, start + width)
    }

    pub fn valid_position(&self, position: u64) -> bool
    {
        position >= self.start && position <= self.end
    }
}

impl fmt::Display for Region
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}:{}-{}", self.chromosome, self.start, self.end)
    }
}

impl FromStr for Region
{
    type Err = ViewerError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        let invalid = || ViewerError::InvalidRegion(s.to_string());
        let (chromosome, range) = s.trim().rsplit_once(':').ok_or_else(invalid)?;
        let (start, end) = range.split_once('-').ok_or_else(invalid)?;

        if chromosome.is_empty()
        {
            return Err(invalid());
        }

        let parse_coordinate = |text: &str| text.trim().replace(',', "").parse::<u64>();
        let start = parse_coordinate(start).map_err(|_| invalid())?;
        let end = parse_coordinate(end).map_err(|_| invalid())?;

        if start == 0 || start > end
        {
            return Err(invalid());
        }

        Ok(Region::new(chromosome, start, end))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn region(s: &str) -> Region
    {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display()
    {
        let r = region("chr1:100-200");
        assert_eq!(r, Region::new("chr1", 100, 200));
        assert_eq!(r.to_string(), "chr1:100-200");
        assert_eq!(r.len(), 101);

        assert_eq!(region("chr_1:1,000-2,000"), Region::new("chr_1", 1000, 2000));
        assert_eq!(region("HLA-A*01:01:1-50").chromosome, "HLA-A*01:01");
    }

    #[test]
    fn test_parse_rejects_bad_regions()
    {
        for bad in ["chr1", "chr1:100", ":1-2", "chr1:a-10", "chr1:200-100", "chr1:0-10"]
        {
            assert!(bad.parse::<Region>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_union_overlaps_both()
    {
        let pairs = [
            (region("chr1:100-200"), region("chr1:150-300")),
            (region("chr1:100-200"), region("chr1:500-600")),
            (region("chr1:10-20"), region("chr1:12-15")),
        ];
        for (a, b) in pairs
        {
            let u = a.union(&b);
            assert!(u.overlaps(&a));
            assert!(u.overlaps(&b));
        }
    }

    #[test]
    fn test_overlaps_and_subset()
    {
        let a = region("chr1:100-200");
        assert!(a.overlaps(&region("chr1:200-300")));
        assert!(!a.overlaps(&region("chr1:201-300")));
        assert!(!a.overlaps(&region("chr2:100-200")));

        assert!(region("chr1:120-180").subset(&a));
        assert!(a.subset(&a));
        assert!(!a.subset(&region("chr1:120-180")));
    }

    #[test]
    fn test_complement_of_itself_is_nothing()
    {
        let a = region("chr1:100-200");
        assert_eq!(a.complement(&a), None);
    }

    #[test]
    fn test_complement_cases()
    {
        let cached = region("chr1:100-150");

        assert_eq!(cached.complement(&region("chr1:300-400")), Some(region("chr1:300-400")));
        assert_eq!(cached.complement(&region("chr2:100-150")), Some(region("chr2:100-150")));
        assert_eq!(cached.complement(&region("chr1:110-140")), None);
        assert_eq!(cached.complement(&region("chr1:100-200")), Some(region("chr1:150-200")));
        assert_eq!(cached.complement(&region("chr1:50-120")), Some(region("chr1:50-100")));
    }

    #[test]
    fn test_complement_two_sided_trims_only_the_end()
    {
        // Known limitation: the 50-100 overhang is not requested.
        let cached = region("chr1:100-150");
        assert_eq!(cached.complement(&region("chr1:50-200")), Some(region("chr1:150-200")));
    }

    #[test]
    fn test_expand_flanking_clamps_start()
    {
        assert_eq!(region("chr1:100-200").expand_flanking(50), region("chr1:50-250"));
        assert_eq!(region("chr1:10-20").expand_flanking(50), region("chr1:1-70"));
    }

    #[test]
    fn test_middle_shift_and_valid_position()
    {
        let r = region("chr1:100-201");
        assert_eq!(r.middle(), 150);

        assert_eq!(r.shift(50), region("chr1:150-251"));
        assert_eq!(r.shift(-50), region("chr1:50-151"));
        assert_eq!(r.shift(-500), region("chr1:1-102"));

        assert!(r.valid_position(100));
        assert!(r.valid_position(201));
        assert!(!r.valid_position(99));
        assert!(!r.valid_position(202));
    }
}
