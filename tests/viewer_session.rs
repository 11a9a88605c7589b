use std::io::Write;
use std::time::Duration;

use bamtrack::region_list::parse_region_list;
use bamtrack::{
    DatasetLocator, LocalFileSource, Region, TimedSource, Viewer, ViewerConfig, ViewerError, ViewerState,
};

const SAM: &str = "@HD\tVN:1.6\tSO:coordinate\n\
                   @SQ\tSN:chr1\tLN:2000\n\
                   r1\t0\tchr1\t101\t60\t8M\t*\t0\t0\tACGTACGT\t*\tNM:i:0\n\
                   r2\t16\tchr1\t105\t60\t4M2I4M\t*\t0\t0\tTTTTGGCCCC\t*\n\
                   r3\t0\tchr1\t110\t60\t3M2D3M\t*\t0\t0\tAAACCC\t*\n\
                   r3dup\t0\tchr1\t110\t60\t3M2D3M\t*\t0\t0\tAAACCC\t*\n\
                   bad\tx\tchr1\t111\t60\t3M\t*\t0\t0\tAAA\t*\n\
                   r4\t0\tchr1\t600\t60\t5M\t*\t0\t0\tGATTA\t*\n\
                   un\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\t*\n";

fn sam_file() -> tempfile::NamedTempFile
{
    let mut file = tempfile::Builder::new().suffix(".sam").tempfile().unwrap();
    file.write_all(SAM.as_bytes()).unwrap();
    file
}

fn viewer(file: &tempfile::NamedTempFile) -> Viewer
{
    let config = ViewerConfig {
        track_width_px: 200.0,
        ..ViewerConfig::default()
    };
    let mut viewer = Viewer::new(config, DatasetLocator::local(file.path().to_string_lossy()));
    viewer.set_chromosome_list(parse_region_list("chr1:1-2000\n"));
    viewer
}

#[test]
fn test_text_track_from_sam_file()
{
    let file = sam_file();
    let source = TimedSource::new(LocalFileSource, Duration::from_secs(5));
    let mut viewer = viewer(&file);

    let model = viewer
        .set_visible_region(Region::new("chr1", 101, 120), &source)
        .unwrap();

    assert_eq!(viewer.state(), ViewerState::RegionReady);
    assert_eq!(viewer.store().len(), 3);
    assert_eq!(viewer.store().get(110, "r3").unwrap().duplicate_count, 2);
    assert_eq!(model.pixels_per_base, 10.0);

    let expected = "chr1:101-120\n\
                    ACGTACGT AAA--CCC\n    \
                    ttttcccc\n";
    assert_eq!(model.to_text(), expected);
}

#[test]
fn test_browsing_session()
{
    let file = sam_file();
    let source = LocalFileSource;
    let mut viewer = viewer(&file);

    viewer
        .set_visible_region(Region::new("chr1", 101, 200), &source)
        .unwrap();

    // Two pixels per base: dragging 100px left shows 50 bases further right
    let model = viewer.pan_pixels(-100.0, &source).unwrap();
    assert_eq!(model.visible, Region::new("chr1", 151, 250));
    assert_eq!(viewer.cache().regions("chr1"), &[Region::new("chr1", 101, 250)]);

    let model = viewer.recenter(600, &source).unwrap();
    assert_eq!(model.visible, Region::new("chr1", 550, 649));
    assert_eq!(model.spans.len(), 1);
    assert_eq!(model.spans[0].record.qname, "r4");

    let err = viewer.recenter(5000, &source).unwrap_err();
    assert!(matches!(err, ViewerError::InvalidPosition { .. }));
    assert_eq!(viewer.visible_region(), Some(&Region::new("chr1", 550, 649)));
}

#[test]
fn test_missing_file_reports_error()
{
    let mut viewer = Viewer::new(ViewerConfig::default(), DatasetLocator::local("/nonexistent/reads.sam"));
    let errors = std::rc::Rc::new(std::cell::Cell::new(0));
    let count = errors.clone();
    viewer.on_error(move |_| count.set(count.get() + 1));

    let err = viewer
        .set_visible_region(Region::new("chr1", 1, 100), &LocalFileSource)
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(errors.get(), 1);
    assert_eq!(viewer.state(), ViewerState::ChromosomeSelected);
    assert!(viewer.visible_region().is_none());
}
