//! Error types shared by the parser, the fetch collaborators and the viewer controller.

use std::time::Duration;

use thiserror::Error;

use crate::region::Region;

/// Result type alias for bamtrack operations
pub type Result<T> = std::result::Result<T, ViewerError>;

/// Error type for bamtrack operations
#[derive(Error, Debug)]
pub enum ViewerError
{
    /// A SAM line with fewer than the eleven mandatory fields
    #[error("Malformed alignment record: expected at least 11 fields, found {fields}")]
    MalformedRecord
    {
        /// Number of tab-separated fields found
        fields: usize,
    },

    /// A numeric field that failed to parse
    #[error("Invalid {field} value '{value}'")]
    InvalidField
    {
        /// Name of the SAM field or tag
        field: String,
        /// The offending text
        value: String,
    },

    /// A CIGAR string with an unknown operation or a missing run length
    #[error("Invalid CIGAR string '{cigar}'")]
    InvalidCigar
    {
        cigar: String,
    },

    /// A region string that is not of the form `chrom:start-end`
    #[error("Invalid region '{0}': expected <chromosome>:<start>-<end>")]
    InvalidRegion(String),

    /// A recenter request outside the chromosome bounds
    #[error("Position {position} is outside {chromosome}")]
    InvalidPosition
    {
        position: u64,
        chromosome: Region,
    },

    #[error("No chromosome selected")]
    NoChromosomeSelected,

    /// The data-fetch collaborator failed
    #[error("Failed to fetch {region}: {reason}")]
    NetworkFetch
    {
        region: String,
        reason: String,
    },

    /// The data-fetch collaborator did not answer in time
    #[error("Fetching {region} timed out after {timeout:?}")]
    FetchTimeout
    {
        region: String,
        timeout: Duration,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ViewerError
{
    /// Whether re-issuing the same request may succeed
    pub fn is_retryable(&self) -> bool
    {
        matches!(self, Self::FetchTimeout { .. } | Self::NetworkFetch { .. })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_malformed_record_message()
    {
        let error = ViewerError::MalformedRecord { fields: 4 };
        let msg = format!("{error}");
        assert!(msg.contains("at least 11 fields"));
        assert!(msg.contains('4'));
    }

    #[test]
    fn test_invalid_position_message()
    {
        let error = ViewerError::InvalidPosition {
            position: 5000,
            chromosome: Region::new("chr1", 1, 1000),
        };
        assert_eq!(format!("{error}"), "Position 5000 is outside chr1:1-1000");
    }

    #[test]
    fn test_retryable()
    {
        let timeout = ViewerError::FetchTimeout {
            region: "chr1:1-10".to_string(),
            timeout: Duration::from_secs(1),
        };
        assert!(timeout.is_retryable());
        assert!(!ViewerError::NoChromosomeSelected.is_retryable());
    }
}
