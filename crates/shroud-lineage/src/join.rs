//! Output columns of a join.

use shroud_core::{CaseSensitivity, JoinConstraint, ResolvedField};

/// Combine the output columns of both join sides.
///
/// `NATURAL` and `USING` merge each shared column into the left side's
/// entry; every other join concatenates.
pub fn merge_join(
    left: Vec<ResolvedField>,
    right: Vec<ResolvedField>,
    constraint: &JoinConstraint,
    mode: CaseSensitivity,
) -> Vec<ResolvedField> {
    match constraint {
        JoinConstraint::Natural => merge_shared(left, right, mode, |_| true),
        JoinConstraint::Using(columns) => merge_shared(left, right, mode, |name| {
            columns.iter().any(|c| mode.ident_eq(c, name))
        }),
        JoinConstraint::None | JoinConstraint::On(_) => {
            let mut fields = left;
            fields.extend(right);
            fields
        }
    }
}

fn merge_shared(
    left: Vec<ResolvedField>,
    right: Vec<ResolvedField>,
    mode: CaseSensitivity,
    is_join_column: impl Fn(&str) -> bool,
) -> Vec<ResolvedField> {
    let mut consumed = vec![false; right.len()];
    let mut fields = Vec::with_capacity(left.len() + right.len());

    for mut field in left {
        if is_join_column(&field.name) {
            for (idx, other) in right.iter().enumerate() {
                if mode.ident_eq(&other.name, &field.name) {
                    field.sensitive |= other.sensitive;
                    consumed[idx] = true;
                }
            }
        }
        fields.push(field);
    }

    fields.extend(
        right
            .into_iter()
            .zip(consumed)
            .filter(|(_, consumed)| !consumed)
            .map(|(field, _)| field),
    );
    fields
}
