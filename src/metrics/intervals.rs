//! Merging of overlapping closed intervals.

/// A closed interval `[start, end]` carrying a payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span<T, P = ()> {
    pub start: T,
    pub end: T,
    pub payload: P,
}

impl<T> Span<T> {
    pub fn new(start: T, end: T) -> Self {
        Span {
            start,
            end,
            payload: (),
        }
    }
}

impl<T, P> Span<T, P> {
    pub fn with_payload(start: T, end: T, payload: P) -> Self {
        Span {
            start,
            end,
            payload,
        }
    }
}

/// Merges overlapping or touching intervals. Output is sorted by start and
/// pairwise disjoint.
pub fn merge_overlapping<T: Ord + Copy>(spans: Vec<Span<T>>) -> Vec<Span<T>> {
    merge_overlapping_by(spans, |_, _| ())
}

/// Same as [`merge_overlapping`], folding the payload of every absorbed
/// interval into the payload of the interval absorbing it.
///
/// Intervals with `end < start` are taken as they are; callers normalize.
pub fn merge_overlapping_by<T, P, F>(mut spans: Vec<Span<T, P>>, mut combine: F) -> Vec<Span<T, P>>
where
    T: Ord + Copy,
    F: FnMut(&mut P, P),
{
    spans.sort_by(|a, b| a.start.cmp(&b.start));

    let mut merged: Vec<Span<T, P>> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(current) if span.start <= current.end => {
                current.end = current.end.max(span.end);
                combine(&mut current.payload, span.payload);
            }
            _ => merged.push(span),
        }
    }
    merged
}
