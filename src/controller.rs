//! Viewer controller: turns visible-region requests into fetches, store
//! updates, row packing and render models.
//!
//! Fetching is split in two halves so callers can run it however they like:
//! [`Viewer::request_visible_region`] hands out a [`FetchRequest`] tagged with
//! a ticket and [`Viewer::complete_fetch`] applies the answer. Only the latest
//! ticket is ever applied. [`Viewer::set_visible_region`] drives both halves
//! synchronously through an [`AlignmentSource`].

use std::collections::HashMap;
use std::time::Instant;

use log::{debug, info, warn};

use crate::cache::LoadedRegionSet;
use crate::config::ViewerConfig;
use crate::error::{Result, ViewerError};
use crate::layout::{pack_rows, RenderModel};
use crate::region::Region;
use crate::sam::parse_sam;
use crate::source::{AlignmentSource, DatasetLocator};
use crate::store::{AlignmentStore, InsertOutcome};
use crate::viewport::Viewport;

/// Window width used when recentring before any region was shown
const DEFAULT_WINDOW: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerState
{
    Uninitialized,
    ChromosomeSelected,
    RegionLoading,
    RegionReady,
}

/// Identifies one issued fetch; later tickets supersede earlier ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FetchTicket(u64);

/// Data the caller must fetch before the requested region can be shown
#[derive(Debug, Clone)]
pub struct FetchRequest
{
    pub ticket: FetchTicket,
    pub dataset: DatasetLocator,
    pub spans: Vec<Region>,
}

#[derive(Debug)]
pub enum ViewRequest
{
    /// Served from already loaded data
    Ready(RenderModel),
    Fetch(FetchRequest),
}

#[derive(Debug)]
pub enum FetchOutcome
{
    Applied(RenderModel),
    /// The ticket was superseded by a newer request
    Discarded,
}

#[derive(Debug)]
struct PendingFetch
{
    ticket: FetchTicket,
    viewport: Viewport,
    /// Region packed once the data arrives (visible window plus prefetch flank)
    region: Region,
    spans: Vec<Region>,
    issued_at: Instant,
    prior_state: ViewerState,
}

type Listener<T> = Box<dyn FnMut(&T)>;

#[derive(Default)]
struct Listeners
{
    region_changed: Vec<Listener<Region>>,
    alignments_updated: Vec<Listener<RenderModel>>,
    error: Vec<Listener<ViewerError>>,
}

pub struct Viewer
{
    config: ViewerConfig,
    dataset: DatasetLocator,
    state: ViewerState,
    chromosomes: HashMap<String, Region>,
    chromosome: Option<Region>,
    /// Window of the last published render model
    viewport: Option<Viewport>,
    /// Region the current row assignment covers
    rendered: Option<Region>,
    store: AlignmentStore,
    cache: LoadedRegionSet,
    pending: Option<PendingFetch>,
    last_ticket: u64,
    drag_anchor: Option<f32>,
    listeners: Listeners,
}

impl Viewer
{
    pub fn new(config: ViewerConfig, dataset: DatasetLocator) -> Self
    {
        Self {
            config,
            dataset,
            state: ViewerState::Uninitialized,
            chromosomes: HashMap::new(),
            chromosome: None,
            viewport: None,
            rendered: None,
            store: AlignmentStore::new(),
            cache: LoadedRegionSet::new(),
            pending: None,
            last_ticket: 0,
            drag_anchor: None,
            listeners: Listeners::default(),
        }
    }

    pub fn state(&self) -> ViewerState
    {
        self.state
    }

    pub fn config(&self) -> &ViewerConfig
    {
        &self.config
    }

    pub fn chromosome(&self) -> Option<&Region>
    {
        self.chromosome.as_ref()
    }

    pub fn visible_region(&self) -> Option<&Region>
    {
        self.viewport.as_ref().map(|vp| &vp.region)
    }

    pub fn rendered_region(&self) -> Option<&Region>
    {
        self.rendered.as_ref()
    }

    pub fn store(&self) -> &AlignmentStore
    {
        &self.store
    }

    pub fn cache(&self) -> &LoadedRegionSet
    {
        &self.cache
    }

    /// Register full chromosome bounds, e.g. from a region list
    pub fn set_chromosome_list(&mut self, regions: impl IntoIterator<Item = Region>)
    {
        self.chromosomes = regions
            .into_iter()
            .map(|region| (region.chromosome.clone(), region))
            .collect();
    }

    pub fn on_region_changed(&mut self, listener: impl FnMut(&Region) + 'static)
    {
        self.listeners.region_changed.push(Box::new(listener));
    }

    pub fn on_alignments_updated(&mut self, listener: impl FnMut(&RenderModel) + 'static)
    {
        self.listeners.alignments_updated.push(Box::new(listener));
    }

    pub fn on_error(&mut self, listener: impl FnMut(&ViewerError) + 'static)
    {
        self.listeners.error.push(Box::new(listener));
    }

    /// Start over on a chromosome: all stored reads and cached regions are dropped
    pub fn select_chromosome(&mut self, chromosome: Region)
    {
        info!("Selecting chromosome {}", chromosome);
        self.store.clear();
        self.cache.clear();
        self.pending = None;
        self.viewport = None;
        self.rendered = None;
        self.drag_anchor = None;
        self.chromosome = Some(chromosome);
        self.state = ViewerState::ChromosomeSelected;
    }

    /// Ask for `region` to become visible.
    ///
    /// Any fetch still outstanding is superseded.
    pub fn request_visible_region(&mut self, region: Region) -> ViewRequest
    {
        self.enter_chromosome(&region);

        if let Some(stale) = self.pending.take()
        {
            debug!("Request for {} supersedes fetch {:?}", region, stale.ticket);
        }

        let chromosome_end = self.chromosome.as_ref().map_or(region.end, |c| c.end);
        let viewport = Viewport::new(region.clone(), chromosome_end, self.config.track_width_px);

        if self.rendered.as_ref().is_some_and(|rendered| region.subset(rendered))
        {
            debug!("{} is already packed, shifting in place", region);
            return ViewRequest::Ready(self.publish(viewport));
        }

        let wanted = region.expand_flanking(self.config.prefetch_flank);
        let spans = self.cache.missing_spans(&wanted, self.config.complement_policy);

        if spans.is_empty()
        {
            debug!("{} fully cached", wanted);
            self.repack(&wanted);
            return ViewRequest::Ready(self.publish(viewport));
        }

        self.last_ticket += 1;
        let ticket = FetchTicket(self.last_ticket);
        let prior_state = if self.rendered.is_some()
        {
            ViewerState::RegionReady
        }
        else
        {
            ViewerState::ChromosomeSelected
        };

        debug!("Fetch {:?} for {}: {:?}", ticket, wanted, spans);
        self.pending = Some(PendingFetch {
            ticket,
            viewport,
            region: wanted,
            spans: spans.clone(),
            issued_at: Instant::now(),
            prior_state,
        });
        self.state = ViewerState::RegionLoading;

        ViewRequest::Fetch(FetchRequest {
            ticket,
            dataset: self.dataset.clone(),
            spans,
        })
    }

    /// Apply the answer to a fetch request.
    ///
    /// Answers to superseded tickets are dropped. A failed or late answer
    /// leaves the previous view in place and is reported to the error
    /// listeners as well as returned.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<String>,
    ) -> Result<FetchOutcome>
    {
        let pending = match self.pending.take()
        {
            Some(pending) if pending.ticket == ticket => pending,
            other =>
            {
                self.pending = other;
                debug!("Discarding stale fetch {:?}", ticket);
                return Ok(FetchOutcome::Discarded);
            }
        };

        let timeout = self.config.fetch_timeout();
        let result = if pending.issued_at.elapsed() > timeout
        {
            Err(ViewerError::FetchTimeout {
                region: pending.region.to_string(),
                timeout,
            })
        }
        else
        {
            result
        };

        let text = match result
        {
            Ok(text) => text,
            Err(e) =>
            {
                warn!("Fetch {:?} for {} failed: {}", ticket, pending.region, e);
                self.state = pending.prior_state;
                for listener in &mut self.listeners.error
                {
                    listener(&e);
                }
                return Err(e);
            }
        };

        let batch = parse_sam(&text);
        let (mut inserted, mut duplicates, mut unmapped) = (0, 0, 0);
        for record in batch.records
        {
            match self.store.insert(record)
            {
                InsertOutcome::Inserted => inserted += 1,
                InsertOutcome::Duplicate => duplicates += 1,
                InsertOutcome::Unmapped => unmapped += 1,
            }
        }
        info!(
            "Loaded {}: {} reads, {} duplicates, {} unmapped, {} bad lines",
            pending.region, inserted, duplicates, unmapped, batch.skipped
        );

        for span in &pending.spans
        {
            self.cache.add_region(span);
        }

        if self.store.len() > self.config.max_stored_records
        {
            let evicted = self
                .store
                .evict_outside(&pending.region, self.config.max_read_length);
            self.cache.clip_to(&pending.region);
            debug!("Evicted {} reads outside {}", evicted, pending.region);
        }

        self.repack(&pending.region);
        Ok(FetchOutcome::Applied(self.publish(pending.viewport)))
    }

    /// Show `region`, fetching through `source` if needed
    pub fn set_visible_region(
        &mut self,
        region: Region,
        source: &dyn AlignmentSource,
    ) -> Result<RenderModel>
    {
        match self.request_visible_region(region)
        {
            ViewRequest::Ready(model) => Ok(model),
            ViewRequest::Fetch(request) =>
            {
                let result = fetch_spans(source, &request);
                match self.complete_fetch(request.ticket, result)?
                {
                    FetchOutcome::Applied(model) => Ok(model),
                    FetchOutcome::Discarded => self.render_model().ok_or(ViewerError::NoChromosomeSelected),
                }
            }
        }
    }

    /// Centre a window of the current width on `position`
    pub fn recenter(&mut self, position: u64, source: &dyn AlignmentSource) -> Result<RenderModel>
    {
        let chromosome = self.chromosome.clone().ok_or(ViewerError::NoChromosomeSelected)?;
        if !chromosome.valid_position(position)
        {
            return Err(ViewerError::InvalidPosition {
                position,
                chromosome,
            });
        }

        let width = self
            .visible_region()
            .map_or(DEFAULT_WINDOW.min(chromosome.len()), Region::len);
        let mut start = position.saturating_sub(width / 2).max(1);
        let mut end = start + width - 1;
        if end > chromosome.end
        {
            end = chromosome.end;
            start = (chromosome.end + 1).saturating_sub(width).max(1);
        }
        let region = Region::new(chromosome.chromosome.clone(), start, end);

        debug!("Recentering on {} -> {}", position, region);
        self.set_visible_region(region, source)
    }

    /// Move the window by a drag of `dx` pixels
    pub fn pan_pixels(&mut self, dx: f32, source: &dyn AlignmentSource) -> Result<RenderModel>
    {
        let mut viewport = self.current_viewport()?;
        viewport.pan_pixels(dx);
        self.set_visible_region(viewport.region, source)
    }

    /// Zoom by `factor` around the relative `focus` point of the track
    pub fn zoom(
        &mut self,
        factor: f64,
        focus: f32,
        source: &dyn AlignmentSource,
    ) -> Result<RenderModel>
    {
        let mut viewport = self.current_viewport()?;
        viewport.zoom(factor, focus);
        self.set_visible_region(viewport.region, source)
    }

    pub fn drag_start(&mut self, x: f32)
    {
        self.drag_anchor = Some(x);
    }

    /// Pan by the distance moved since the last drag event
    pub fn drag_move(&mut self, x: f32, source: &dyn AlignmentSource) -> Result<Option<RenderModel>>
    {
        let Some(anchor) = self.drag_anchor
        else
        {
            return Ok(None);
        };
        self.drag_anchor = Some(x);
        self.pan_pixels(x - anchor, source).map(Some)
    }

    pub fn drag_end(&mut self)
    {
        self.drag_anchor = None;
    }

    /// Model of the currently shown window
    pub fn render_model(&self) -> Option<RenderModel>
    {
        let viewport = self.viewport.as_ref()?;
        let records = self
            .store
            .overlapping(&viewport.region, self.config.max_read_length);
        Some(RenderModel::build(viewport, records))
    }

    fn current_viewport(&self) -> Result<Viewport>
    {
        let viewport = self.viewport.clone().ok_or(ViewerError::NoChromosomeSelected)?;
        let chromosome_end = self.chromosome.as_ref().map_or(viewport.region.end, |c| c.end);
        let screen_width = viewport.screen_width();
        Ok(Viewport::new(viewport.region, chromosome_end, screen_width))
    }

    fn enter_chromosome(&mut self, region: &Region)
    {
        let known = self.chromosomes.get(&region.chromosome).cloned();
        let same = self
            .chromosome
            .as_ref()
            .is_some_and(|current| current.chromosome == region.chromosome);

        if !same
        {
            let chromosome =
                known.unwrap_or_else(|| Region::new(region.chromosome.clone(), 1, region.end));
            self.select_chromosome(chromosome);
            return;
        }

        // Unregistered chromosomes grow with the furthest request
        if let (None, Some(current)) = (known, &mut self.chromosome)
        {
            current.end = current.end.max(region.end);
        }
    }

    fn repack(&mut self, window: &Region)
    {
        self.store.clear_rows();
        let mut records = self
            .store
            .overlapping_mut(window, self.config.max_read_length);
        let rows = pack_rows(&mut records, window);
        debug!("Packed {} reads into {} rows over {}", records.len(), rows, window);
        self.rendered = Some(window.clone());
    }

    fn publish(&mut self, viewport: Viewport) -> RenderModel
    {
        let records = self
            .store
            .overlapping(&viewport.region, self.config.max_read_length);
        let model = RenderModel::build(&viewport, records);

        for listener in &mut self.listeners.region_changed
        {
            listener(&viewport.region);
        }

        self.viewport = Some(viewport);
        self.state = ViewerState::RegionReady;

        for listener in &mut self.listeners.alignments_updated
        {
            listener(&model);
        }
        model
    }
}

fn fetch_spans(source: &dyn AlignmentSource, request: &FetchRequest) -> Result<String>
{
    let mut text = String::new();
    for span in &request.spans
    {
        text.push_str(&source.fetch(&request.dataset, span)?);
        if !text.is_empty() && !text.ends_with('\n')
        {
            text.push('\n');
        }
    }
    Ok(text)
}
