use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::region::Region;

/// How a partially cached request is turned into fetch spans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplementPolicy
{
    /// Trim one side only (see [`Region::complement`]); a request overhanging
    /// both ends of a cached region loses its left overhang.
    #[default]
    OneSided,
    /// Fetch both overhangs of a two-sided miss
    TwoSpan,
}

impl ComplementPolicy
{
    /// Spans of `requested` not covered by `cached`; empty when fully covered
    pub fn missing(&self, cached: &Region, requested: &Region) -> Vec<Region>
    {
        match self
        {
            ComplementPolicy::OneSided => cached.complement(requested).into_iter().collect(),
            ComplementPolicy::TwoSpan =>
            {
                let left_overhang = requested.start < cached.start;
                let right_overhang = requested.end > cached.end;
                if cached.overlaps(requested) && left_overhang && right_overhang
                {
                    vec![
                        Region::new(requested.chromosome.clone(), requested.start, cached.start),
                        Region::new(requested.chromosome.clone(), cached.end, requested.end),
                    ]
                }
                else
                {
                    cached.complement(requested).into_iter().collect()
                }
            }
        }
    }
}

/// Disjoint regions already fetched, per chromosome
#[derive(Debug, Default)]
pub struct LoadedRegionSet
{
    regions: HashMap<String, Vec<Region>>,
}

impl LoadedRegionSet
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn clear(&mut self)
    {
        self.regions.clear();
    }

    pub fn regions(&self, chromosome: &str) -> &[Region]
    {
        self.regions.get(chromosome).map(Vec::as_slice).unwrap_or_default()
    }

    /// Most recently added region overlapping `region`
    pub fn overlapping(&self, region: &Region) -> Option<&Region>
    {
        self.regions(&region.chromosome)
            .iter()
            .rev()
            .find(|r| r.overlaps(region))
    }

    /// Record a fetched region, merging it with whatever it overlaps
    pub fn add_region(&mut self, region: &Region)
    {
        let regions = self.regions.entry(region.chromosome.clone()).or_default();

        let mut merged = region.clone();
        let mut slot = None;
        while let Some(idx) = regions.iter().rposition(|r| r.overlaps(&merged))
        {
            merged = regions[idx].union(&merged);
            regions.remove(idx);
            slot = Some(idx);
        }

        debug!("Cache now holds {} (added {})", merged, region);
        match slot
        {
            Some(idx) => regions.insert(idx.min(regions.len()), merged),
            None => regions.push(merged),
        }
    }

    /// Trim every cached region to `keep` and forget the rest
    pub fn clip_to(&mut self, keep: &Region)
    {
        self.regions.retain(|chromosome, regions| {
            if *chromosome != keep.chromosome
            {
                return false;
            }
            regions.retain(|r| r.overlaps(keep));
            for r in regions.iter_mut()
            {
                r.start = r.start.max(keep.start);
                r.end = r.end.min(keep.end);
            }
            !regions.is_empty()
        });
    }

    /// Part of `requested` that still has to be fetched, `None` when cached
    pub fn missing_complement(&self, requested: &Region) -> Option<Region>
    {
        match self.overlapping(requested)
        {
            Some(cached) => cached.complement(requested),
            None => Some(requested.clone()),
        }
    }

    /// Fetch spans for `requested` under `policy`; empty when cached
    pub fn missing_spans(&self, requested: &Region, policy: ComplementPolicy) -> Vec<Region>
    {
        match self.overlapping(requested)
        {
            Some(cached) => policy.missing(cached, requested),
            None => vec![requested.clone()],
        }
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
    fn test_empty_cache_fetches_everything()
    {
        let cache = LoadedRegionSet::new();
        assert_eq!(cache.missing_complement(&region("chr1:100-200")), Some(region("chr1:100-200")));
    }

    #[test]
    fn test_subset_needs_nothing()
    {
        let mut cache = LoadedRegionSet::new();
        cache.add_region(&region("chr1:50-250"));
        assert_eq!(cache.missing_complement(&region("chr1:100-200")), None);
        assert!(cache
            .missing_spans(&region("chr1:100-200"), ComplementPolicy::TwoSpan)
            .is_empty());
    }

    #[test]
    fn test_partial_overlap_trims_one_side()
    {
        let mut cache = LoadedRegionSet::new();
        cache.add_region(&region("chr1:100-150"));
        assert_eq!(cache.missing_complement(&region("chr1:100-200")), Some(region("chr1:150-200")));
    }

    #[test]
    fn test_two_sided_miss_by_policy()
    {
        let mut cache = LoadedRegionSet::new();
        cache.add_region(&region("chr1:100-150"));
        let requested = region("chr1:50-200");

        // Default policy pins the single-span behaviour
        assert_eq!(
            cache.missing_spans(&requested, ComplementPolicy::OneSided),
            vec![region("chr1:150-200")]
        );
        assert_eq!(
            cache.missing_spans(&requested, ComplementPolicy::TwoSpan),
            vec![region("chr1:50-100"), region("chr1:150-200")]
        );
    }

    #[test]
    fn test_other_chromosome_is_not_cached()
    {
        let mut cache = LoadedRegionSet::new();
        cache.add_region(&region("chr1:100-200"));
        assert_eq!(cache.missing_complement(&region("chr2:100-200")), Some(region("chr2:100-200")));
    }

    #[test]
    fn test_add_region_merges_and_stays_disjoint()
    {
        let mut cache = LoadedRegionSet::new();
        cache.add_region(&region("chr1:100-200"));
        cache.add_region(&region("chr1:500-600"));
        assert_eq!(cache.regions("chr1").len(), 2);

        cache.add_region(&region("chr1:150-250"));
        assert_eq!(cache.regions("chr1"), &[region("chr1:100-250"), region("chr1:500-600")]);

        // Bridges both entries
        cache.add_region(&region("chr1:240-510"));
        assert_eq!(cache.regions("chr1"), &[region("chr1:100-600")]);
    }

    #[test]
    fn test_clip_to()
    {
        let mut cache = LoadedRegionSet::new();
        cache.add_region(&region("chr1:100-200"));
        cache.add_region(&region("chr1:300-400"));
        cache.add_region(&region("chr2:1-50"));

        cache.clip_to(&region("chr1:150-350"));
        assert_eq!(cache.regions("chr1"), &[region("chr1:150-200"), region("chr1:300-350")]);
        assert!(cache.regions("chr2").is_empty());
    }

    #[test]
    fn test_overlapping_prefers_most_recent()
    {
        let mut cache = LoadedRegionSet::new();
        cache.add_region(&region("chr1:100-200"));
        cache.add_region(&region("chr1:300-400"));
        assert_eq!(cache.overlapping(&region("chr1:150-350")), Some(&region("chr1:300-400")));
    }
}
