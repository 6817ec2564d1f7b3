//! Positional combination of set-operation branches.

use shroud_core::{ResolvedField, SetOpKind, Span};

use crate::error::EvalError;

/// Align two branches column by column. The left branch names the result.
pub fn combine(
    left: Vec<ResolvedField>,
    right: &[ResolvedField],
    kind: SetOpKind,
    span: Span,
) -> Result<Vec<ResolvedField>, EvalError> {
    if left.len() != right.len() {
        return Err(EvalError::ColumnCountMismatch {
            context: format!("{kind} branches"),
            expected: left.len(),
            found: right.len(),
            span,
        });
    }
    Ok(left
        .into_iter()
        .zip(right)
        .map(|(mut field, other)| {
            field.sensitive |= other.sensitive;
            field
        })
        .collect())
}

/// Fold any number of branches left to right.
pub fn combine_all(
    branches: impl IntoIterator<Item = Vec<ResolvedField>>,
    kind: SetOpKind,
    span: Span,
) -> Result<Vec<ResolvedField>, EvalError> {
    let mut branches = branches.into_iter();
    let Some(first) = branches.next() else {
        return Ok(Vec::new());
    };
    branches.try_fold(first, |acc, branch| combine(acc, &branch, kind, span))
}
