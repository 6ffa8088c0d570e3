//! Progress milestones for the clip pipeline.
//!
//! Clients render a single progress bar from these values, so within one
//! execution the reported percentage must never go backwards. Resume resets
//! to the milestone of the re-entry point.

/// Named points on the progress scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    Submitted,
    AcquisitionStarted,
    AssetsReady,
    Analyzing,
    ExtractionDone,
    Combining,
    Uploading,
    Done,
}

impl Milestone {
    pub fn percent(&self) -> u8 {
        match self {
            Milestone::Submitted => 0,
            Milestone::AcquisitionStarted => 25,
            Milestone::AssetsReady => 50,
            Milestone::Analyzing => 55,
            Milestone::ExtractionDone => 75,
            Milestone::Combining => 80,
            Milestone::Uploading => 85,
            Milestone::Done => 100,
        }
    }
}

/// Interpolate progress across the per-asset extraction sweep.
///
/// Asset `index` of `total` maps into the (Analyzing, ExtractionDone]
/// range; the result is clamped so rounding can never exceed the next
/// milestone.
pub fn extraction_progress(index: usize, total: usize) -> u8 {
    let lo = Milestone::Analyzing.percent() as f64;
    let hi = Milestone::ExtractionDone.percent() as f64;
    if total == 0 {
        return hi as u8;
    }
    let frac = (index + 1) as f64 / total as f64;
    (lo + (hi - lo) * frac).round().min(hi) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_milestones_are_monotone() {
        let order = [
            Milestone::Submitted,
            Milestone::AcquisitionStarted,
            Milestone::AssetsReady,
            Milestone::Analyzing,
            Milestone::ExtractionDone,
            Milestone::Combining,
            Milestone::Uploading,
            Milestone::Done,
        ];
        for pair in order.windows(2) {
            assert!(pair[0].percent() < pair[1].percent());
        }
        assert_eq!(Milestone::Done.percent(), 100);
    }

    #[test]
    fn test_extraction_progress_monotone_and_bounded() {
        let total = 5;
        let mut prev = Milestone::Analyzing.percent();
        for i in 0..total {
            let p = extraction_progress(i, total);
            assert!(p >= prev);
            assert!(p <= Milestone::ExtractionDone.percent());
            prev = p;
        }
        assert_eq!(
            extraction_progress(total - 1, total),
            Milestone::ExtractionDone.percent()
        );
    }

    #[test]
    fn test_single_asset_jumps_to_done_milestone() {
        assert_eq!(
            extraction_progress(0, 1),
            Milestone::ExtractionDone.percent()
        );
    }
}
