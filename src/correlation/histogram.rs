//! Fixed-width two-dimensional frequency histogram.
//!
//! Entries falling outside either axis are tallied separately and take no
//! part in any statistic, the way under/overflow bins behave in classic
//! binned analyses.

/// A uniform axis over `[lo, hi)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Axis {
    bins: usize,
    lo: f64,
    hi: f64,
}

impl Axis {
    /// Returns `None` unless `bins >= 1`, both bounds are finite, and `lo < hi`.
    pub fn new(bins: usize, lo: f64, hi: f64) -> Option<Self> {
        if bins == 0 || !lo.is_finite() || !hi.is_finite() || lo >= hi {
            return None;
        }
        Some(Self { bins, lo, hi })
    }

    /// Builds an axis from constants already known to be valid.
    pub(crate) const fn fixed(bins: usize, lo: f64, hi: f64) -> Self {
        Self { bins, lo, hi }
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn width(&self) -> f64 {
        (self.hi - self.lo) / self.bins as f64
    }

    pub fn center(&self, bin: usize) -> f64 {
        self.lo + (bin as f64 + 0.5) * self.width()
    }

    /// Bin holding `value`, or `None` if it lies outside `[lo, hi)`.
    pub fn find_bin(&self, value: f64) -> Option<usize> {
        if !value.is_finite() || value < self.lo || value >= self.hi {
            return None;
        }
        let bin = ((value - self.lo) / self.width()).floor() as usize;
        // guards rounding right below `hi`
        Some(bin.min(self.bins - 1))
    }
}

/// Counts over an x-axis × y-axis grid.
#[derive(Debug, Clone)]
pub struct Histogram2d {
    x: Axis,
    y: Axis,
    counts: Vec<u32>,
    out_of_range: u32,
}

/// Frequency-weighted moments of a [`Histogram2d`] computed from bin centres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinnedMoments {
    pub entries: u32,
    pub mean_x: f64,
    pub mean_y: f64,
    pub var_x: f64,
    pub var_y: f64,
    pub cov_xy: f64,
}

impl Histogram2d {
    pub fn new(x: Axis, y: Axis) -> Self {
        Self {
            x,
            y,
            counts: vec![0; x.bins() * y.bins()],
            out_of_range: 0,
        }
    }

    pub fn x_axis(&self) -> &Axis {
        &self.x
    }

    pub fn y_axis(&self) -> &Axis {
        &self.y
    }

    pub fn fill(&mut self, x: f64, y: f64) {
        match (self.x.find_bin(x), self.y.find_bin(y)) {
            (Some(i), Some(j)) => self.counts[i * self.y.bins() + j] += 1,
            _ => self.out_of_range += 1,
        }
    }

    /// Fills directly by x-bin index, used for categorical axes.
    pub fn fill_bin(&mut self, x_bin: usize, y: f64) {
        match (x_bin < self.x.bins(), self.y.find_bin(y)) {
            (true, Some(j)) => self.counts[x_bin * self.y.bins() + j] += 1,
            _ => self.out_of_range += 1,
        }
    }

    pub fn count(&self, x_bin: usize, y_bin: usize) -> u32 {
        self.counts[x_bin * self.y.bins() + y_bin]
    }

    /// Row of y-counts for one x-bin.
    pub fn column(&self, x_bin: usize) -> &[u32] {
        let ny = self.y.bins();
        &self.counts[x_bin * ny..(x_bin + 1) * ny]
    }

    pub fn entries(&self) -> u32 {
        self.counts.iter().sum()
    }

    pub fn out_of_range(&self) -> u32 {
        self.out_of_range
    }

    /// Means, variances, and covariance with each bin standing at its
    /// centre and weighted by its count. `None` when the grid is empty.
    pub fn moments(&self) -> Option<BinnedMoments> {
        let entries = self.entries();
        if entries == 0 {
            return None;
        }

        let n = f64::from(entries);
        let mut sx = 0.0;
        let mut sy = 0.0;
        for i in 0..self.x.bins() {
            let xc = self.x.center(i);
            for (j, &c) in self.column(i).iter().enumerate() {
                let w = f64::from(c);
                sx += w * xc;
                sy += w * self.y.center(j);
            }
        }
        let mean_x = sx / n;
        let mean_y = sy / n;

        let mut sxx = 0.0;
        let mut syy = 0.0;
        let mut sxy = 0.0;
        for i in 0..self.x.bins() {
            let dx = self.x.center(i) - mean_x;
            for (j, &c) in self.column(i).iter().enumerate() {
                let w = f64::from(c);
                let dy = self.y.center(j) - mean_y;
                sxx += w * dx * dx;
                syy += w * dy * dy;
                sxy += w * dx * dy;
            }
        }

        Some(BinnedMoments {
            entries,
            mean_x,
            mean_y,
            var_x: sxx / n,
            var_y: syy / n,
            cov_xy: sxy / n,
        })
    }
}
