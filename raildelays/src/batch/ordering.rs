//! Null-safe ordering of report rows.

use std::cmp::Ordering;

use crate::domain::ReportRow;

/// Chronological order over optional rows.
///
/// A missing row sorts after every present row, and two missing rows are
/// equal. Present rows compare by date, expected departure, then expected
/// arrival, each with missing values last.
pub fn compare(lho: Option<&ReportRow>, rho: Option<&ReportRow>) -> Ordering {
    match (lho, rho) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(l), Some(r)) => l.natural_cmp(r),
    }
}

/// Sort `rows` chronologically, keeping the relative order of ties.
pub fn sort_rows(rows: &mut [ReportRow]) {
    rows.sort_by(|a, b| compare(Some(a), Some(b)));
}
