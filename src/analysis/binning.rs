//! Z-axis binning
//!
//! Fixed partition of a configured z range into half-open bins, and the
//! per-bin means the q-variance model is fitted against.

use crate::analysis::params::{BinSpec, FitTarget};

/// Half-open interval `[lower, upper)` on the z axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    pub index: usize,
    pub lower: f64,
    pub upper: f64,
}

impl Bin {
    pub fn contains(&self, z: f64) -> bool {
        z >= self.lower && z < self.upper
    }

    pub fn midpoint(&self) -> f64 {
        0.5 * (self.lower + self.upper)
    }
}

/// Member means of one populated bin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinAggregate {
    pub bin: Bin,
    pub count: usize,
    /// Mean z of the members
    pub mean_z: f64,
    /// Mean sigma (or sigma², per the fit target) of the members
    pub mean_target: f64,
}

/// Fixed-width partition of `[min, max)`
#[derive(Debug, Clone, PartialEq)]
pub struct BinGrid {
    min: f64,
    max: f64,
    width: f64,
    count: usize,
}

impl BinGrid {
    /// Build a grid from a validated range and bin spec
    ///
    /// With `BinSpec::Width` the last bin is clipped at `max` when the
    /// width does not divide the range evenly.
    pub fn new(min: f64, max: f64, spec: BinSpec) -> Self {
        let span = max - min;
        let count = spec.count_over(span) as usize;
        let width = match spec {
            BinSpec::Count(_) => span / count as f64,
            BinSpec::Width(width) => width,
        };
        Self {
            min,
            max,
            width,
            count,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn bin(&self, index: usize) -> Option<Bin> {
        if index >= self.count {
            return None;
        }
        let lower = self.min + index as f64 * self.width;
        let upper = if index + 1 == self.count {
            self.max
        } else {
            self.min + (index + 1) as f64 * self.width
        };
        Some(Bin {
            index,
            lower,
            upper,
        })
    }

    /// Index of the bin containing `z`, or None outside `[min, max)`
    pub fn locate(&self, z: f64) -> Option<usize> {
        if !(z >= self.min && z < self.max) {
            return None;
        }
        let index = ((z - self.min) / self.width).floor() as usize;
        let index = index.min(self.count - 1);
        // floating-point edge: z sits just below a computed lower edge
        match self.bin(index) {
            Some(bin) if z < bin.lower && index > 0 => Some(index - 1),
            _ => Some(index),
        }
    }

    /// Bin `(z, sigma)` records and average each sufficiently populated bin
    ///
    /// Records outside the range are ignored. Bins with fewer than
    /// `min_points` members are omitted. Output is ordered by bin index.
    pub fn aggregate<I>(&self, records: I, target: FitTarget, min_points: usize) -> Vec<BinAggregate>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut sums = vec![(0usize, 0.0f64, 0.0f64); self.count];
        for (z, sigma) in records {
            if let Some(index) = self.locate(z) {
                let slot = &mut sums[index];
                slot.0 += 1;
                slot.1 += z;
                slot.2 += match target {
                    FitTarget::Volatility => sigma,
                    FitTarget::Variance => sigma * sigma,
                };
            }
        }

        sums.into_iter()
            .enumerate()
            .filter(|(_, (count, _, _))| *count > 0 && *count >= min_points)
            .filter_map(|(index, (count, z_sum, target_sum))| {
                Some(BinAggregate {
                    bin: self.bin(index)?,
                    count,
                    mean_z: z_sum / count as f64,
                    mean_target: target_sum / count as f64,
                })
            })
            .collect()
    }
}
