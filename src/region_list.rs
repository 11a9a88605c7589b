//! Chromosome region list and the region selector slider model.

use std::io::BufRead;

use anyhow::Result;
use log::warn;

use crate::region::Region;

/// Parse one region per line; blank and `#` lines are ignored, bad lines skipped
pub fn parse_region_list(text: &str) -> Vec<Region>
{
    let mut regions = Vec::new();

    for (line_num, line) in text.lines().enumerate()
    {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#')
        {
            continue;
        }

        match line.parse::<Region>()
        {
            Ok(region) => regions.push(region),
            Err(e) => warn!("Skipping region list line {}: {}", line_num + 1, e),
        }
    }

    regions
}

/// Read a region list from any reader
pub fn read_region_list<R: BufRead>(mut reader: R) -> Result<Vec<Region>>
{
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    Ok(parse_region_list(&text))
}

/// Slider over one chromosome region, tracking the selected centre base
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSelector
{
    range: Region,
    value: u64,
}

impl RegionSelector
{
    pub fn new(range: Region) -> Self
    {
        let value = range.start;
        Self { range, value }
    }

    pub fn range(&self) -> &Region
    {
        &self.range
    }

    pub fn value(&self) -> u64
    {
        self.value
    }

    /// Switch to a new chromosome region; the slider moves to its start
    pub fn set_region(&mut self, range: Region)
    {
        self.value = range.start;
        self.range = range;
    }

    /// Move the slider, clamped to the range; returns the centre if it changed
    pub fn set_value(&mut self, value: u64) -> Option<u64>
    {
        let value = value.clamp(self.range.start, self.range.end);
        if value == self.value
        {
            return None;
        }
        self.value = value;
        Some(value)
    }

    /// Follow the viewer: put the slider on the middle of the shown region
    pub fn set_selected_region(&mut self, selected: &Region) -> Option<u64>
    {
        self.set_value(selected.middle())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_parse_region_list()
    {
        let text = "# chromosomes\nchr_1:1-400\n\nchr_2:1-1,000\nnot a region\nchr3:50-10\n";
        let regions = parse_region_list(text);
        assert_eq!(
            regions,
            vec![Region::new("chr_1", 1, 400), Region::new("chr_2", 1, 1000)]
        );
    }

    #[test]
    fn test_read_region_list()
    {
        let regions = read_region_list(&b"chr1:1-100\nchr2:1-200\n"[..]).unwrap();
        assert_eq!(regions.len(), 2);
    }

    #[test]
    fn test_selector_follows_selected_region()
    {
        let mut selector = RegionSelector::new(Region::new("chr1", 1, 1000));
        assert_eq!(selector.value(), 1);

        assert_eq!(selector.set_selected_region(&Region::new("chr1", 100, 200)), Some(150));
        assert_eq!(selector.set_selected_region(&Region::new("chr1", 100, 200)), None);

        assert_eq!(selector.set_value(5000), Some(1000));

        selector.set_region(Region::new("chr2", 10, 20));
        assert_eq!(selector.value(), 10);
        assert_eq!(selector.range().chromosome, "chr2");
    }
}
