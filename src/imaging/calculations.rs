//! Pure calculation functions for dimensions and budget searches.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate the dimensions that fit an image inside a longest-side bound.
///
/// Returns `None` when no resize is needed: the bound is `0` (unbounded) or
/// the longer side already fits. Otherwise the longer side becomes exactly
/// `max_dimension` and the shorter side is scaled by the same factor,
/// rounded to the nearest pixel (never below 1).
///
/// # Examples
/// ```
/// # use fotei::imaging::fit_within;
/// assert_eq!(fit_within((4000, 3000), 1080), Some((1080, 810)));
/// assert_eq!(fit_within((600, 400), 1080), None);
/// assert_eq!(fit_within((600, 400), 0), None);
/// ```
pub fn fit_within(dims: (u32, u32), max_dimension: u32) -> Option<(u32, u32)> {
    let (width, height) = dims;
    if max_dimension == 0 || width.max(height) <= max_dimension {
        return None;
    }

    let scale = |short: u32, long: u32| -> u32 {
        ((short as f64 * max_dimension as f64 / long as f64).round() as u32).max(1)
    };

    if width >= height {
        Some((max_dimension, scale(height, width)))
    } else {
        Some((scale(width, height), max_dimension))
    }
}

/// How encoded size moves as the searched knob increases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeTrend {
    /// Lossy quality: higher knob, larger file.
    GrowsWithKnob,
    /// Lossless compression level: higher knob, smaller file.
    ShrinksWithKnob,
}

/// One encode attempt made during a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe<T> {
    pub knob: u8,
    pub size: u64,
    pub output: T,
}

/// Where a budget search ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome<T> {
    /// The best probe that stayed within budget.
    Fit(Probe<T>),
    /// Nothing fit; the last (most aggressive) probe tried.
    Fallback(Probe<T>),
}

impl<T> SearchOutcome<T> {
    pub fn probe(&self) -> &Probe<T> {
        match self {
            Self::Fit(p) | Self::Fallback(p) => p,
        }
    }

    pub fn fits(&self) -> bool {
        matches!(self, Self::Fit(_))
    }

    pub fn into_probe(self) -> Probe<T> {
        match self {
            Self::Fit(p) | Self::Fallback(p) => p,
        }
    }
}

/// Binary search for the knob whose output is closest to, without exceeding, `budget`.
///
/// `probe` encodes at a knob value and returns the output with its measured
/// size. After a fitting probe the search moves toward larger output (higher
/// quality, lower level); after an overshoot it moves toward smaller output.
///
/// Among fitting probes the largest size wins; equal sizes prefer the higher
/// quality or lower compression level. Returns `None` only for an empty range.
pub fn search_budget<T, E>(
    range: (u8, u8),
    trend: SizeTrend,
    budget: u64,
    mut probe: impl FnMut(u8) -> Result<(T, u64), E>,
) -> Result<Option<SearchOutcome<T>>, E> {
    let (mut low, mut high) = (i32::from(range.0), i32::from(range.1));
    let mut outcome: Option<SearchOutcome<T>> = None;

    while low <= high {
        let mid = (low + high) / 2;
        let knob = mid as u8;
        let (output, size) = probe(knob)?;
        let fits = size <= budget;

        match (trend, fits) {
            (SizeTrend::GrowsWithKnob, true) | (SizeTrend::ShrinksWithKnob, false) => low = mid + 1,
            (SizeTrend::GrowsWithKnob, false) | (SizeTrend::ShrinksWithKnob, true) => {
                high = mid - 1
            }
        }

        let candidate = Probe { knob, size, output };
        outcome = match outcome {
            Some(SearchOutcome::Fit(best)) if !fits || !prefers(trend, &candidate, &best) => {
                Some(SearchOutcome::Fit(best))
            }
            _ if fits => Some(SearchOutcome::Fit(candidate)),
            _ => Some(SearchOutcome::Fallback(candidate)),
        };
    }

    Ok(outcome)
}

fn prefers<T>(trend: SizeTrend, candidate: &Probe<T>, best: &Probe<T>) -> bool {
    if candidate.size != best.size {
        return candidate.size > best.size;
    }
    match trend {
        SizeTrend::GrowsWithKnob => candidate.knob > best.knob,
        SizeTrend::ShrinksWithKnob => candidate.knob < best.knob,
    }
}
