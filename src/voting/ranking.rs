use crate::models::RankedOption;
use std::cmp::Ordering;

/// Ordering for finite scores. Inputs are validated upstream, so NaN never
/// reaches here; -0.0 and 0.0 compare equal.
pub(crate) fn by_float(a: &f64, b: &f64) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

/// Lexicographic ranking order: non-vetoed first, then median, p10, p90 and
/// mean descending, then option id ascending.
pub fn compare(a: &RankedOption, b: &RankedOption) -> Ordering {
    a.veto
        .cmp(&b.veto)
        .then_with(|| by_float(&b.median, &a.median))
        .then_with(|| by_float(&b.p10, &a.p10))
        .then_with(|| by_float(&b.p90, &a.p90))
        .then_with(|| by_float(&b.mean, &a.mean))
        .then_with(|| a.option_id.cmp(&b.option_id))
}

/// Sorts the options and assigns 1-indexed ranks.
pub fn assign_ranks(mut options: Vec<RankedOption>) -> Vec<RankedOption> {
    options.sort_by(compare);
    for (i, option) in options.iter_mut().enumerate() {
        option.rank = i + 1;
    }
    options
}
