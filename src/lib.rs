//! Core of a read-alignment track viewer: region algebra, SAM parsing with
//! CIGAR expansion, an in-memory alignment store, a cache of fetched regions,
//! greedy row packing and the controller that ties them to a visible window.

pub mod alignment;
pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod layout;
pub mod region;
pub mod region_list;
pub mod sam;
pub mod source;
pub mod store;
pub mod viewport;

pub use alignment::{AlignmentRecord, CigarOp, Glyph};
pub use cache::{ComplementPolicy, LoadedRegionSet};
pub use config::ViewerConfig;
pub use controller::{FetchOutcome, FetchRequest, FetchTicket, ViewRequest, Viewer, ViewerState};
pub use error::{Result, ViewerError};
pub use layout::{RenderModel, RenderSpan};
pub use region::Region;
pub use source::{AlignmentSource, DatasetLocator, LocalFileSource, TimedSource};
pub use store::AlignmentStore;
