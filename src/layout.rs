use serde::{Deserialize, Serialize};

use crate::alignment::{AlignmentRecord, Glyph};
use crate::region::Region;
use crate::viewport::Viewport;

/// Greedy first-fit row assignment over `window`.
///
/// Records must arrive in ascending position order (ties in insertion order).
/// A record takes the first row that is free at its clipped start and then
/// occupies that row up to its clipped end. With sorted input a row is free at
/// a base exactly when the last read placed on it ends before that base, so
/// each row only tracks its end and the cost does not grow with the window
/// width. Records outside the window get no row. Returns the number of rows
/// used.
pub fn pack_rows(records: &mut [&mut AlignmentRecord], window: &Region) -> usize
{
    let mut row_ends: Vec<u64> = Vec::new();

    for record in records.iter_mut()
    {
        if record.rname != window.chromosome || record.end() < window.start || record.pos > window.end
        {
            record.assigned_row = None;
            continue;
        }

        let first = record.pos.max(window.start);
        let last = record.end().min(window.end);

        let row_idx = match row_ends.iter().position(|&end| end < first)
        {
            Some(idx) => idx,
            None =>
            {
                row_ends.push(0);
                row_ends.len() - 1
            }
        };

        row_ends[row_idx] = last;
        record.assigned_row = Some(row_idx);
    }

    row_ends.len()
}

/// One read placed on the track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSpan
{
    pub record: AlignmentRecord,
    pub row: usize,
    pub pixel_left: f32,
    pub pixel_width: f32,
    pub glyphs: Vec<Glyph>,
}

/// Everything the rendering side needs to draw the visible window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderModel
{
    pub visible: Region,
    pub pixels_per_base: f32,
    pub rows: usize,
    pub spans: Vec<RenderSpan>,
}

impl RenderModel
{
    /// Build the model from packed records overlapping the viewport
    pub fn build<'a>(
        viewport: &Viewport,
        records: impl IntoIterator<Item = &'a AlignmentRecord>,
    ) -> Self
    {
        let pixels_per_base = viewport.pixels_per_base();
        let mut spans: Vec<RenderSpan> = records
            .into_iter()
            .filter_map(|record| {
                let row = record.assigned_row?;
                Some(RenderSpan {
                    record: record.clone(),
                    row,
                    pixel_left: viewport.position_to_screen(record.pos),
                    pixel_width: record.display_length() as f32 * pixels_per_base,
                    glyphs: record.parsed_seq.clone(),
                })
            })
            .collect();
        spans.sort_by_key(|span| (span.row, span.record.pos));

        let rows = spans.iter().map(|span| span.row + 1).max().unwrap_or(0);

        Self {
            visible: viewport.region.clone(),
            pixels_per_base,
            rows,
            spans,
        }
    }

    /// Plain-text track: one line per row, one column per visible base.
    ///
    /// Reverse-strand bases are lower case.
    pub fn to_text(&self) -> String
    {
        let width = self.visible.len() as usize;
        let mut lines = vec![vec![b' '; width]; self.rows];

        for span in &self.spans
        {
            let forward = span.record.strand_forward();
            for (i, glyph) in span.glyphs.iter().enumerate()
            {
                let position = span.record.pos + i as u64;
                if !self.visible.valid_position(position)
                {
                    continue;
                }
                let c = glyph.as_char() as u8;
                lines[span.row][(position - self.visible.start) as usize] =
                    if forward { c } else { c.to_ascii_lowercase() };
            }
        }

        let mut text = format!("{}\n", self.visible);
        for line in lines
        {
            text.push_str(String::from_utf8_lossy(&line).trim_end());
            text.push('\n');
        }
        text
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::sam::parse_sam_line;

    fn record(name: &str, flag: u16, pos: u64, cigar: &str, seq: &str) -> AlignmentRecord
    {
        let line = format!("{name}\t{flag}\tchr1\t{pos}\t60\t{cigar}\t*\t0\t0\t{seq}\t*");
        parse_sam_line(&line).unwrap()
    }

    fn rows_of(records: &mut [AlignmentRecord], window: &Region) -> Vec<Option<usize>>
    {
        let mut refs: Vec<&mut AlignmentRecord> = records.iter_mut().collect();
        pack_rows(&mut refs, window);
        records.iter().map(|r| r.assigned_row).collect()
    }

    fn sample() -> Vec<AlignmentRecord>
    {
        vec![
            record("read1", 0, 100, "10M", "ACGTACGTAC"),
            record("read2", 0, 105, "10M", "ACGTACGTAC"),
            record("read3", 0, 110, "5M", "ACGTA"),
            record("read4", 0, 112, "4M", "ACGT"),
            record("read5", 0, 300, "5M", "ACGTA"),
        ]
    }

    #[test]
    fn test_first_fit_rows()
    {
        let window = Region::new("chr1", 100, 130);
        let mut records = sample();
        let rows = rows_of(&mut records, &window);

        // read1 covers 100-109, read2 105-114, read3 110-114, read4 112-115
        assert_eq!(rows, vec![Some(0), Some(1), Some(0), Some(2), None]);
    }

    #[test]
    fn test_packing_is_deterministic()
    {
        let window = Region::new("chr1", 100, 130);
        let mut first = sample();
        let mut second = sample();
        assert_eq!(rows_of(&mut first, &window), rows_of(&mut second, &window));
    }

    #[test]
    fn test_read_starting_before_window()
    {
        let window = Region::new("chr1", 100, 120);
        let mut records = vec![
            record("early", 0, 95, "10M", "ACGTACGTAC"),
            record("edge", 0, 100, "3M", "ACG"),
            record("later", 0, 105, "3M", "ACG"),
        ];
        let rows = rows_of(&mut records, &window);
        assert_eq!(rows, vec![Some(0), Some(1), Some(0)]);
    }

    #[test]
    fn test_deletions_widen_the_footprint()
    {
        let window = Region::new("chr1", 100, 130);
        let mut records = vec![
            record("gap", 0, 100, "3M5D3M", "ACGACG"),
            record("next", 0, 108, "3M", "ACG"),
            record("after", 0, 111, "3M", "ACG"),
        ];
        let rows = rows_of(&mut records, &window);
        assert_eq!(rows, vec![Some(0), Some(1), Some(0)]);
    }

    #[test]
    fn test_chromosome_wide_window()
    {
        let window = Region::new("chr1", 1, 248_956_422);
        let mut records = vec![
            record("a", 0, 1_000, "10M", "ACGTACGTAC"),
            record("b", 0, 1_005, "10M", "ACGTACGTAC"),
            record("c", 0, 200_000_000, "4M", "ACGT"),
        ];
        let mut refs: Vec<&mut AlignmentRecord> = records.iter_mut().collect();
        assert_eq!(pack_rows(&mut refs, &window), 2);
        assert_eq!(
            records.iter().map(|r| r.assigned_row).collect::<Vec<_>>(),
            vec![Some(0), Some(1), Some(0)]
        );
    }

    #[test]
    fn test_render_model_pixels_and_text()
    {
        let window = Region::new("chr1", 101, 110);
        let viewport = Viewport::new(window.clone(), 1000, 100.0);
        let mut records = vec![
            record("fwd", 0, 101, "4M", "ACGT"),
            record("rev", 16, 103, "2M1D2M", "GGCC"),
        ];
        rows_of(&mut records, &window);

        let model = RenderModel::build(&viewport, records.iter());
        assert_eq!(model.rows, 2);
        assert_eq!(model.spans.len(), 2);
        assert_eq!(model.spans[0].pixel_left, 0.0);
        assert_eq!(model.spans[0].pixel_width, 40.0);
        assert_eq!(model.spans[1].row, 1);
        assert_eq!(model.spans[1].pixel_left, 20.0);
        assert_eq!(model.spans[1].pixel_width, 50.0);

        assert_eq!(model.to_text(), "chr1:101-110\nACGT\n  gg-cc\n");
    }
}
