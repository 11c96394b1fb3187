//! Pixel statistics for the saturation panels
//!
//! - Saturation percentage: share of pixels exactly at the sensor maximum
//! - Percentile with linear interpolation between ranks, for contrast clipping
//! - Fixed-count histogram over the data range
//! - Outline of the saturated region, drawn over the image in red

use crate::container::Frame;

/// Percentage of pixels equal to `max`. An empty slice is 0%.
pub fn saturation_percent(pixels: &[u16], max: u16) -> f64 {
    if pixels.is_empty() {
        return 0.0;
    }
    let saturated = pixels.iter().filter(|&&p| p == max).count();
    saturated as f64 / pixels.len() as f64 * 100.0
}

/// Smallest and largest value
pub fn min_max(pixels: &[u16]) -> Option<(u16, u16)> {
    let min = *pixels.iter().min()?;
    let max = *pixels.iter().max()?;
    Some((min, max))
}

/// `q`-th percentile (0..=100), interpolating linearly between the two nearest ranks.
///
/// Uses a counting pass over the 16-bit value range rather than sorting.
pub fn percentile(pixels: &[u16], q: f64) -> Option<f64> {
    if pixels.is_empty() {
        return None;
    }
    let mut counts = vec![0usize; usize::from(u16::MAX) + 1];
    for &p in pixels {
        counts[usize::from(p)] += 1;
    }

    let position = (q.clamp(0.0, 100.0) / 100.0) * (pixels.len() - 1) as f64;
    let lower_rank = position.floor() as usize;
    let upper_rank = position.ceil() as usize;
    let fraction = position - lower_rank as f64;

    let lower = value_at_rank(&counts, lower_rank)?;
    let upper = value_at_rank(&counts, upper_rank)?;
    Some(f64::from(lower) + (f64::from(upper) - f64::from(lower)) * fraction)
}

fn value_at_rank(counts: &[usize], rank: usize) -> Option<u16> {
    let mut seen = 0usize;
    for (value, &count) in counts.iter().enumerate() {
        seen += count;
        if seen > rank {
            return u16::try_from(value).ok();
        }
    }
    None
}

/// Histogram with equal-width bins over `[lo, hi]`, last bin closed.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBins {
    /// Count per bin
    pub counts: Vec<u32>,
    /// Left edge of the first bin
    pub lo: f64,
    /// Right edge of the last bin
    pub hi: f64,
}

impl HistogramBins {
    /// Bin `pixels` into `bins` bins spanning their min..max.
    ///
    /// A constant image gets the range `[v - 0.5, v + 0.5]` so it still has width.
    pub fn compute(pixels: &[u16], bins: usize) -> Self {
        let bins = bins.max(1);
        let Some((min, max)) = min_max(pixels) else {
            return Self {
                counts: vec![0; bins],
                lo: 0.0,
                hi: 1.0,
            };
        };

        let (lo, hi) = if min == max {
            (f64::from(min) - 0.5, f64::from(max) + 0.5)
        } else {
            (f64::from(min), f64::from(max))
        };
        let scale = bins as f64 / (hi - lo);

        let mut counts = vec![0u32; bins];
        for &p in pixels {
            let bin = ((f64::from(p) - lo) * scale) as usize;
            counts[bin.min(bins - 1)] += 1;
        }
        Self { counts, lo, hi }
    }

    /// Width of one bin
    pub fn bin_width(&self) -> f64 {
        (self.hi - self.lo) / self.counts.len() as f64
    }

    /// Left edge of bin `i`
    pub fn bin_start(&self, i: usize) -> f64 {
        self.lo + i as f64 * self.bin_width()
    }

    /// Largest bin count
    pub fn max_count(&self) -> u32 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Number of bins
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether every bin is empty
    pub fn is_empty(&self) -> bool {
        self.max_count() == 0
    }
}

/// Pixels on the edge of the region at or above `max - 1`.
///
/// This traces the contour of the band `[max - 1, max + 1]`: a pixel is on the outline
/// when it is inside the region and a 4-neighbour is outside it or off the frame.
pub fn saturation_outline(frame: &Frame, max: u16) -> Vec<bool> {
    let threshold = max.saturating_sub(1);
    let (width, height) = (frame.width(), frame.height());
    let inside = |x: usize, y: usize| frame.get(x, y).is_some_and(|v| v >= threshold);

    let mut outline = vec![false; width * height];
    for y in 0..height {
        for x in 0..width {
            if !inside(x, y) {
                continue;
            }
            let on_edge = x == 0
                || y == 0
                || x + 1 == width
                || y + 1 == height
                || !inside(x - 1, y)
                || !inside(x + 1, y)
                || !inside(x, y - 1)
                || !inside(x, y + 1);
            outline[y * width + x] = on_edge;
        }
    }
    outline
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturation_all_and_none() {
        assert_eq!(saturation_percent(&[255; 64], 255), 100.0);
        assert_eq!(saturation_percent(&[254; 64], 255), 0.0);
        assert_eq!(saturation_percent(&[], 255), 0.0);
    }

    #[test]
    fn test_saturation_counts_exact_matches_only() {
        let pixels = [255, 256, 254, 255];
        assert_eq!(saturation_percent(&pixels, 255), 50.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let pixels: Vec<u16> = (0..=100).collect();
        assert_eq!(percentile(&pixels, 99.0), Some(99.0));
        assert_eq!(percentile(&pixels, 50.0), Some(50.0));

        // position 0.99 * 3 = 2.97, between the ranks holding 30 and 40
        let pixels = [10u16, 30, 20, 40];
        let p = percentile(&pixels, 99.0).unwrap();
        assert!((p - 39.7).abs() < 1e-9, "got {p}");
        assert_eq!(percentile(&[], 99.0), None);
    }

    #[test]
    fn test_histogram_range_and_counts() {
        let pixels = [0u16, 0, 50, 100];
        let hist = HistogramBins::compute(&pixels, 10);
        assert_eq!(hist.len(), 10);
        assert_eq!((hist.lo, hist.hi), (0.0, 100.0));
        assert_eq!(hist.counts[0], 2);
        assert_eq!(hist.counts[5], 1);
        assert_eq!(hist.counts[9], 1);
        assert_eq!(hist.counts.iter().sum::<u32>(), 4);
        assert_eq!(hist.max_count(), 2);
    }

    #[test]
    fn test_histogram_constant_image() {
        let hist = HistogramBins::compute(&[200; 16], 100);
        assert_eq!((hist.lo, hist.hi), (199.5, 200.5));
        assert_eq!(hist.counts[50], 16);
    }

    #[test]
    fn test_outline_marks_region_border() {
        #[rustfmt::skip]
        let pixels = vec![
            0,   0,   0,   0,   0,
            0, 255, 255, 255,   0,
            0, 255, 255, 255,   0,
            0, 255, 255, 255,   0,
            0,   0,   0,   0,   0,
        ];
        let frame = Frame::new(5, 5, pixels).unwrap();
        let outline = saturation_outline(&frame, 255);
        assert!(outline[5 + 1]);
        assert!(outline[3 * 5 + 3]);
        assert!(!outline[2 * 5 + 2], "interior pixel is not on the outline");
        assert!(!outline[0]);
        assert_eq!(outline.iter().filter(|&&o| o).count(), 8);
    }
}
