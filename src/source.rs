//! Data-fetch collaborators: given a dataset and a region, produce SAM text.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};
use flate2::read::MultiGzDecoder;
use log::{debug, info, warn};
use noodles::bam;
use noodles::sam;
use noodles::sam::alignment::io::Write as AlignmentWrite;
use noodles::sam::alignment::record_buf::QualityScores;
use noodles::sam::alignment::RecordBuf;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewerError};
use crate::region::Region;
use crate::sam::parse_sam_line;

/// Highest base quality a SAM QUAL string can encode
const MAX_SAM_QUALITY: u8 = 93;

/// Where alignments come from: a server endpoint and/or a BAM and reference name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetLocator
{
    /// Base URL of a region server; empty for local files
    pub url: String,
    pub bam: String,
    pub reference: String,
}

impl DatasetLocator
{
    pub fn local(path: impl Into<String>) -> Self
    {
        Self {
            bam: path.into(),
            ..Default::default()
        }
    }

    /// Region query against the server, e.g. `http://host/region?bam=x&region=chr1:1-400&ref=y`
    pub fn query_url(&self, region: &Region) -> String
    {
        let mut url = format!("{}?bam={}&region={}", self.url, self.bam, region);
        if !self.reference.is_empty()
        {
            url.push_str("&ref=");
            url.push_str(&self.reference);
        }
        url
    }
}

/// Anything that can answer a region query with SAM lines
pub trait AlignmentSource
{
    fn fetch(&self, dataset: &DatasetLocator, region: &Region) -> Result<String>;
}

fn fetch_error(region: &Region, reason: impl ToString) -> ViewerError
{
    ViewerError::NetworkFetch {
        region: region.to_string(),
        reason: reason.to_string(),
    }
}

fn open_text(path: &Path) -> Result<Box<dyn BufRead>>
{
    let file = File::open(path)?;
    let reader: Box<dyn BufRead> = if path.extension().is_some_and(|ext| ext == "gz")
    {
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    }
    else
    {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}

/// Plain or gzipped SAM text on disk, filtered to the requested region
#[derive(Debug, Default, Clone)]
pub struct SamFileSource;

impl SamFileSource
{
    fn filter<R: BufRead>(reader: R, region: &Region) -> Result<String>
    {
        let mut text = String::new();

        for line in reader.lines()
        {
            let line = line?;
            if line.is_empty() || line.starts_with('@')
            {
                continue;
            }

            // Lines that do not parse are handed on so the parser can report them
            let keep = match parse_sam_line(&line)
            {
                Ok(record) =>
                {
                    record.rname == region.chromosome
                        && record.pos <= region.end
                        && record.end() >= region.start
                }
                Err(_) => line.split('\t').nth(2) == Some(region.chromosome.as_str()),
            };

            if keep
            {
                text.push_str(&line);
                text.push('\n');
            }
        }

        Ok(text)
    }
}

impl AlignmentSource for SamFileSource
{
    fn fetch(&self, dataset: &DatasetLocator, region: &Region) -> Result<String>
    {
        debug!("Reading {} from SAM file {}", region, dataset.bam);
        let reader = open_text(Path::new(&dataset.bam)).map_err(|e| fetch_error(region, e))?;
        Self::filter(reader, region)
    }
}

/// BAM file on disk, decoded with noodles and re-emitted as SAM lines
#[derive(Debug, Default, Clone)]
pub struct BamFileSource;

impl BamFileSource
{
    fn read_region<R: Read>(mut reader: bam::io::Reader<R>, region: &Region) -> Result<String>
    {
        let header = reader.read_header()?;
        let mut text = String::new();

        for (i, result) in reader.records().enumerate()
        {
            let record = match result
            {
                Ok(record) => record,
                Err(e) =>
                {
                    warn!("Stopping BAM read of {} after {} records: {}", region, i, e);
                    break;
                }
            };

            match Self::sam_line(&header, &record, region)
            {
                Ok(Some(line)) => text.push_str(&line),
                Ok(None) => {}
                Err(e) => warn!("Skipping BAM record {}: {}", i + 1, e),
            }
        }

        Ok(text)
    }

    /// SAM line for a mapped record overlapping `region`, `None` otherwise
    fn sam_line(
        header: &sam::Header,
        record: &bam::Record,
        region: &Region,
    ) -> io::Result<Option<String>>
    {
        use sam::alignment::record::cigar::op::Kind;

        if record.flags().is_unmapped()
        {
            return Ok(None);
        }

        let ref_name = match record.reference_sequence_id()
        {
            Some(id) => header
                .reference_sequences()
                .get_index(id?)
                .map(|(name, _)| name.to_string()),
            None => None,
        };
        if ref_name.as_deref() != Some(region.chromosome.as_str())
        {
            return Ok(None);
        }

        let start = match record.alignment_start()
        {
            Some(pos) => usize::from(pos?) as u64,
            None => return Ok(None),
        };

        let mut reference_length = 0;
        for op in record.cigar().iter()
        {
            let op = op?;
            if matches!(
                op.kind(),
                Kind::Match | Kind::Deletion | Kind::Skip | Kind::SequenceMatch | Kind::SequenceMismatch
            )
            {
                reference_length += op.len() as u64;
            }
        }
        let end = start + reference_length.max(1) - 1;

        if start > region.end || end < region.start
        {
            return Ok(None);
        }

        // BAM stores a missing QUAL as 0xFF per base, which SAM cannot print
        let mut record = RecordBuf::try_from_alignment_record(header, record)?;
        if record
            .quality_scores()
            .as_ref()
            .iter()
            .any(|&score| score > MAX_SAM_QUALITY)
        {
            *record.quality_scores_mut() = QualityScores::default();
        }

        let mut writer = sam::io::Writer::new(Vec::new());
        writer.write_alignment_record(header, &record)?;
        String::from_utf8(writer.into_inner())
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl AlignmentSource for BamFileSource
{
    fn fetch(&self, dataset: &DatasetLocator, region: &Region) -> Result<String>
    {
        debug!("Reading {} from BAM file {}", region, dataset.bam);
        let file = File::open(&dataset.bam).map_err(|e| fetch_error(region, e))?;
        Self::read_region(bam::io::Reader::new(file), region)
    }
}

/// Picks the BAM or SAM reader from the dataset's file extension
#[derive(Debug, Default, Clone)]
pub struct LocalFileSource;

impl AlignmentSource for LocalFileSource
{
    fn fetch(&self, dataset: &DatasetLocator, region: &Region) -> Result<String>
    {
        if dataset.bam.starts_with("http://") || dataset.bam.starts_with("https://")
        {
            return Err(fetch_error(
                region,
                "HTTP datasets need a network source; download the file first",
            ));
        }

        if dataset.bam.ends_with(".bam")
        {
            BamFileSource.fetch(dataset, region)
        }
        else
        {
            SamFileSource.fetch(dataset, region)
        }
    }
}

/// Runs another source on a worker thread and gives up after `timeout`.
///
/// A fetch that outlives its timeout keeps running on its thread; its result
/// is dropped when it arrives.
pub struct TimedSource<S>
{
    inner: Arc<S>,
    timeout: Duration,
}

impl<S> TimedSource<S>
where
    S: AlignmentSource + Send + Sync + 'static,
{
    pub fn new(inner: S, timeout: Duration) -> Self
    {
        Self {
            inner: Arc::new(inner),
            timeout,
        }
    }
}

impl<S> AlignmentSource for TimedSource<S>
where
    S: AlignmentSource + Send + Sync + 'static,
{
    fn fetch(&self, dataset: &DatasetLocator, region: &Region) -> Result<String>
    {
        let (tx, rx) = bounded(1);
        let inner = Arc::clone(&self.inner);
        let dataset_owned = dataset.clone();
        let region_owned = region.clone();

        thread::spawn(move || {
            let _ = tx.send(inner.fetch(&dataset_owned, &region_owned));
        });

        match rx.recv_timeout(self.timeout)
        {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) =>
            {
                info!("Fetch of {} timed out after {:?}", region, self.timeout);
                Err(ViewerError::FetchTimeout {
                    region: region.to_string(),
                    timeout: self.timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(fetch_error(region, "fetch worker exited")),
        }
    }
}
