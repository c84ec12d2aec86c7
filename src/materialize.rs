//! Row materialization for sqlmapper.
//!
//! Converts driver rows into caller shapes: primitive scalars, flat objects
//! mapped by column name, or several objects split out of one row and stitched
//! together by a combining function.

use crate::error::{MapperError, Result};
use crate::types::{ColumnInfo, FromValue, Row, RowView};

/// Boundary column name used when a split mapping does not name one.
pub const DEFAULT_SPLIT: &str = "id";

/// A shape constructible from a row view.
///
/// Implementations map columns to fields by name, case-insensitively, through
/// [`RowView::get`]; fields without a matching column keep their defaults and
/// extra columns are ignored.
///
/// ```
/// use sqlmapper::{FromRow, Result, RowView};
///
/// #[derive(Default)]
/// struct Person {
///     id: i64,
///     name: String,
/// }
///
/// impl FromRow for Person {
///     fn from_row(view: &RowView<'_>) -> Result<Self> {
///         Ok(Self {
///             id: view.get("id")?,
///             name: view.get("name")?,
///         })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    fn from_row(view: &RowView<'_>) -> Result<Self>;
}

/// Tuples map positionally: element `i` converts from column `i`.
macro_rules! impl_from_row_tuple {
    ($arity:literal; $($idx:tt: $name:ident),+) => {
        impl<$($name,)+> FromRow for ($($name,)+)
        where
            $($name: FromValue,)+
        {
            fn from_row(view: &RowView<'_>) -> Result<Self> {
                Ok(($(
                    $name::from_value(view.value_at($idx).ok_or_else(|| {
                        MapperError::type_mismatch(format!(
                            "row has {} columns, tuple needs {}",
                            view.len(),
                            $arity,
                        ))
                    })?)?,
                )+))
            }
        }
    };
}

impl_from_row_tuple!(1; 0: A);
impl_from_row_tuple!(2; 0: A, 1: B);
impl_from_row_tuple!(3; 0: A, 1: B, 2: C);
impl_from_row_tuple!(4; 0: A, 1: B, 2: C, 3: D);

/// Converts a single-column row into a primitive.
///
/// A row with any other column count is a `TypeMismatch`, as is a failing
/// cast.
pub fn scalar_from_row<T>(row: &Row) -> Result<T>
where
    T: FromValue,
{
    if row.len() != 1 {
        return Err(MapperError::type_mismatch(format!(
            "scalar query returned {} columns, expected exactly 1",
            row.len()
        )));
    }
    T::from_value(&row.values()[0])
}

/// Computes the group start indexes for an N-way split of `columns`.
///
/// Group 1 always starts at column 0. Each following group starts at the
/// first column after the previous group's start whose name matches that
/// group's boundary; when the boundary list is shorter than needed its last
/// entry repeats, and an empty list means [`DEFAULT_SPLIT`]. A boundary with
/// no match falls back to the column right after the previous start.
pub fn split_points(columns: &[ColumnInfo], boundaries: &[String], groups: usize) -> Vec<usize> {
    let mut points = Vec::with_capacity(groups);
    points.push(0);

    let mut prev = 0;
    for k in 1..groups {
        let boundary = boundaries
            .get(k - 1)
            .or_else(|| boundaries.last())
            .map(String::as_str)
            .unwrap_or(DEFAULT_SPLIT);

        let found = columns
            .iter()
            .enumerate()
            .skip(prev + 1)
            .find(|(_, c)| c.name.eq_ignore_ascii_case(boundary))
            .map(|(i, _)| i);

        let point = found.unwrap_or(prev + 1);
        points.push(point);
        prev = point;
    }

    points
}

/// Splits one row into two shapes and combines them.
///
/// The combining function runs exactly once per row.
pub fn map2_from_row<A, B, T, F>(row: &Row, boundaries: &[String], combine: &mut F) -> Result<T>
where
    A: FromRow,
    B: FromRow,
    F: FnMut(A, B) -> T,
{
    let view = row.view();
    let points = split_points(row.columns(), boundaries, 2);
    let a = A::from_row(&view.narrow(points[0]..points[1]))?;
    let b = B::from_row(&view.narrow(points[1]..view.len()))?;
    Ok(combine(a, b))
}

/// Splits one row into three shapes and combines them.
pub fn map3_from_row<A, B, C, T, F>(row: &Row, boundaries: &[String], combine: &mut F) -> Result<T>
where
    A: FromRow,
    B: FromRow,
    C: FromRow,
    F: FnMut(A, B, C) -> T,
{
    let view = row.view();
    let points = split_points(row.columns(), boundaries, 3);
    let a = A::from_row(&view.narrow(points[0]..points[1]))?;
    let b = B::from_row(&view.narrow(points[1]..points[2]))?;
    let c = C::from_row(&view.narrow(points[2]..view.len()))?;
    Ok(combine(a, b, c))
}
