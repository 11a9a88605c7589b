use crate::region::Region;

/// Smallest window a zoom can reach, in bases
const MIN_ZOOM_WIDTH: u64 = 20;

/// Visible window over one chromosome, mapped onto a track of fixed pixel width
#[derive(Debug, Clone)]
pub struct Viewport
{
    pub region: Region,
    chromosome_end: u64,
    screen_width: f32,
}

impl Viewport
{
    pub fn new(region: Region, chromosome_end: u64, screen_width: f32) -> Self
    {
        Self {
            region,
            chromosome_end: chromosome_end.max(1),
            screen_width,
        }
    }

    pub fn width(&self) -> u64
    {
        self.region.len()
    }

    pub fn screen_width(&self) -> f32
    {
        self.screen_width
    }

    pub fn pixels_per_base(&self) -> f32
    {
        self.screen_width / self.width() as f32
    }

    /// Move the window by `delta` bases, keeping it inside the chromosome
    pub fn pan(&mut self, delta: i64)
    {
        let width = self.width();
        let mut shifted = self.region.shift(delta);

        if shifted.end > self.chromosome_end
        {
            shifted.end = self.chromosome_end;
            shifted.start = (self.chromosome_end + 1).saturating_sub(width).max(1);
        }

        self.region = shifted;
    }

    /// Move the window by a drag of `dx` pixels; dragging right shows earlier bases
    pub fn pan_pixels(&mut self, dx: f32)
    {
        let bases_moved = (dx / self.pixels_per_base()) as i64;
        self.pan(-bases_moved);
    }

    /// Scale the window by `factor` around the relative `focus` point (0.0 = left edge)
    pub fn zoom(&mut self, factor: f64, focus: f32)
    {
        let width = self.width() as f64;
        let new_width = (width * factor)
            .max(MIN_ZOOM_WIDTH as f64)
            .min(self.chromosome_end as f64) as u64;

        let focus_point = self.region.start + (width * focus as f64) as u64;
        let new_start = focus_point
            .saturating_sub((new_width as f64 * focus as f64) as u64)
            .max(1);

        let mut zoomed = Region::new(self.region.chromosome.clone(), new_start, new_start + new_width - 1);
        if zoomed.end > self.chromosome_end
        {
            zoomed.end = self.chromosome_end;
            zoomed.start = (self.chromosome_end + 1).saturating_sub(new_width).max(1);
        }

        self.region = zoomed;
    }

    /// Pixel offset of the left edge of `position`; negative left of the window
    pub fn position_to_screen(&self, position: u64) -> f32
    {
        let relative_pos = position as f64 - self.region.start as f64;
        (relative_pos * self.pixels_per_base() as f64) as f32
    }

    pub fn screen_to_position(&self, screen_x: f32) -> u64
    {
        let ratio = screen_x / self.screen_width;
        self.region.start + (self.width() as f32 * ratio) as u64
    }
}
