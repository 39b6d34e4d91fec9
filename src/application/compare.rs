//! Field comparison used when results must be ordered in memory.
//!
//! Records expose their sortable fields through an accessor returning a
//! [`FieldValue`]. [`compare_values`] compares values of matching kinds and
//! reports any other pairing as equal. That relation is not transitive, so
//! the sorts here use [`compare_total`], which ranks kinds before values.

use std::cmp::Ordering;

use time::OffsetDateTime;

use crate::domain::types::SortOrder;

/// A field value lifted out of a record for comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Integer(i64),
    Number(f64),
    Timestamp(OffsetDateTime),
    /// Absent, null or a kind with no defined ordering.
    Other,
}

impl From<i64> for FieldValue<'_> {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl<'a> From<&'a str> for FieldValue<'a> {
    fn from(value: &'a str) -> Self {
        FieldValue::Text(value)
    }
}

impl From<OffsetDateTime> for FieldValue<'_> {
    fn from(value: OffsetDateTime) -> Self {
        FieldValue::Timestamp(value)
    }
}

/// Records that can be ordered by a closed set of named fields.
pub trait Sortable {
    type Field: Copy;

    fn field_value(&self, field: Self::Field) -> FieldValue<'_>;
}

/// Three-way comparison of `a` and `b` on the field picked by `selector`.
/// Mismatched kinds, missing values and NaN compare equal.
pub fn compare_values<T, F>(a: &T, b: &T, selector: F, order: SortOrder) -> Ordering
where
    F: Fn(&T) -> FieldValue<'_>,
{
    let ordering = match (selector(a), selector(b)) {
        (FieldValue::Text(left), FieldValue::Text(right)) => locale_compare(left, right),
        (FieldValue::Timestamp(left), FieldValue::Timestamp(right)) => left.cmp(&right),
        (left, right) => numeric_compare(left, right).unwrap_or(Ordering::Equal),
    };

    directed(ordering, order)
}

/// [`compare_values`] over a [`Sortable`] field selector.
pub fn compare_by_field<T: Sortable>(a: &T, b: &T, field: T::Field, order: SortOrder) -> Ordering {
    compare_values(a, b, |record| record.field_value(field), order)
}

/// Total order for sorting. Numbers rank before timestamps, timestamps before
/// text and missing values come last whatever the direction. `order` flips
/// the ordering within a kind only. NaN sorts after every other number, also
/// whatever the direction.
pub fn compare_total(left: FieldValue<'_>, right: FieldValue<'_>, order: SortOrder) -> Ordering {
    let by_kind = kind_rank(&left).cmp(&kind_rank(&right));
    if by_kind != Ordering::Equal {
        return by_kind;
    }

    let ordering = match (left, right) {
        (FieldValue::Text(left), FieldValue::Text(right)) => locale_compare(left, right),
        (FieldValue::Timestamp(left), FieldValue::Timestamp(right)) => left.cmp(&right),
        (left, right) => match numeric_compare(left, right) {
            Some(ordering) => ordering,
            None => return is_nan(&left).cmp(&is_nan(&right)),
        },
    };

    directed(ordering, order)
}

/// Stable in-memory sort of `records` on `field`.
pub fn sort_records<T: Sortable>(records: &mut [T], field: T::Field, order: SortOrder) {
    records.sort_by(|a, b| compare_total(a.field_value(field), b.field_value(field), order));
}

/// Lexical ordering that ignores case at the primary level and places the
/// lowercase form first when two strings differ only by case.
pub fn locale_compare(left: &str, right: &str) -> Ordering {
    let folded_left = left.chars().flat_map(char::to_lowercase);
    let folded_right = right.chars().flat_map(char::to_lowercase);

    folded_left
        .cmp(folded_right)
        .then_with(|| {
            left.chars()
                .map(char::is_uppercase)
                .cmp(right.chars().map(char::is_uppercase))
        })
        .then_with(|| left.cmp(right))
}

fn directed(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

fn kind_rank(value: &FieldValue<'_>) -> u8 {
    match value {
        FieldValue::Integer(_) | FieldValue::Number(_) => 0,
        FieldValue::Timestamp(_) => 1,
        FieldValue::Text(_) => 2,
        FieldValue::Other => 3,
    }
}

fn is_nan(value: &FieldValue<'_>) -> bool {
    matches!(value, FieldValue::Number(number) if number.is_nan())
}

/// Exact numeric comparison. `None` for NaN or non-numeric operands.
fn numeric_compare(left: FieldValue<'_>, right: FieldValue<'_>) -> Option<Ordering> {
    match (left, right) {
        (FieldValue::Integer(left), FieldValue::Integer(right)) => Some(left.cmp(&right)),
        (FieldValue::Integer(left), FieldValue::Number(right)) => integer_float_cmp(left, right),
        (FieldValue::Number(left), FieldValue::Integer(right)) => {
            integer_float_cmp(right, left).map(Ordering::reverse)
        }
        (FieldValue::Number(left), FieldValue::Number(right)) => left.partial_cmp(&right),
        _ => None,
    }
}

fn integer_float_cmp(int: i64, float: f64) -> Option<Ordering> {
    // 2^63: the smallest float above i64::MAX; -2^63 is i64::MIN exactly.
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

    if float.is_nan() {
        return None;
    }
    if float >= TWO_POW_63 {
        return Some(Ordering::Less);
    }
    if float < -TWO_POW_63 {
        return Some(Ordering::Greater);
    }

    let whole = float.trunc();
    let fraction = float - whole;
    Some(int.cmp(&(whole as i64)).then_with(|| {
        if fraction > 0.0 {
            Ordering::Less
        } else if fraction < 0.0 {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }))
}
