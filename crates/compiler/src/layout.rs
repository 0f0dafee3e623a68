//! State layout planner (component E).
//!
//! Computes per-type cardinality and encoded bit width, reorders record
//! fields by descending width, and assigns state variables their bit
//! offsets (the offset assignment itself lives in `scope::ScopeStack`;
//! this module supplies the widths it consumes).

use crate::ast::Type;

/// `cardinality` is the **product** of field cardinalities for a
/// Record (resolved Open Question: see DESIGN.md — an early prototype
/// computed a sum, which this implementation does not follow).
pub fn cardinality(ty: &Type) -> u64 {
    match ty {
        Type::Boolean => 2,
        Type::Range { lo, hi } => (hi - lo + 1) as u64,
        Type::Enum { members } => members.len() as u64,
        Type::Scalarset { n } => *n,
        Type::Array { index, element } => cardinality(index).saturating_mul(cardinality(element)),
        Type::Record { fields } => fields
            .iter()
            .map(|(_, t)| cardinality(t))
            .fold(1u64, |acc, c| acc.saturating_mul(c)),
        Type::TypeRef(_) => 0,
    }
}

fn bits_for_cardinality(card: u64) -> u32 {
    if card <= 1 {
        return 0;
    }
    (u64::BITS - (card - 1).leading_zeros()).max(1)
}

/// Encoded width in bits. `needs_undefined` budgets one extra encoded
/// value (placed immediately after the type's normal range) iff the
/// model calls `isundefined` on a variable of this type.
pub fn encoded_width(ty: &Type, needs_undefined: bool) -> u32 {
    match ty {
        Type::Array { index, element } => {
            cardinality(index) as u32 * encoded_width(element, needs_undefined)
        }
        Type::Record { fields } => fields.iter().map(|(_, t)| encoded_width(t, false)).sum(),
        _ => {
            let card = cardinality(ty) + if needs_undefined { 1 } else { 0 };
            bits_for_cardinality(card)
        }
    }
}

/// Sorts a record's fields by descending encoded width, ties broken by
/// declaration order, so wider fields are packed first. Returns the
/// reordered fields and whether any reordering actually occurred (the
/// code generator reports this once per occurrence as a debug
/// diagnostic).
pub fn reorder_record_fields(fields: &[(String, Type)]) -> (Vec<(String, Type)>, bool) {
    let mut indexed: Vec<(usize, &(String, Type))> = fields.iter().enumerate().collect();
    indexed.sort_by(|(ia, (_, ta)), (ib, (_, tb))| {
        let wa = encoded_width(ta, false);
        let wb = encoded_width(tb, false);
        wb.cmp(&wa).then(ia.cmp(ib))
    });
    let reordered: Vec<(String, Type)> = indexed.iter().map(|(_, f)| (*f).clone()).collect();
    let changed = reordered
        .iter()
        .map(|(n, _)| n.as_str())
        .ne(fields.iter().map(|(n, _)| n.as_str()));
    (reordered, changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_cardinality_is_the_product_of_field_cardinalities() {
        let rec = Type::Record {
            fields: vec![
                ("a".to_string(), Type::Boolean),
                ("b".to_string(), Type::Range { lo: 0, hi: 2 }),
            ],
        };
        assert_eq!(cardinality(&rec), 2 * 3);
    }

    #[test]
    fn boolean_width_is_one_bit_without_undefined() {
        assert_eq!(encoded_width(&Type::Boolean, false), 1);
    }

    #[test]
    fn boolean_width_grows_to_two_bits_when_undefined_is_referenced() {
        assert_eq!(encoded_width(&Type::Boolean, true), 2);
    }

    #[test]
    fn range_width_matches_log2_of_cardinality() {
        assert_eq!(encoded_width(&Type::Range { lo: 0, hi: 7 }, false), 3);
        assert_eq!(encoded_width(&Type::Range { lo: 0, hi: 8 }, false), 4);
    }

    #[test]
    fn array_width_is_index_cardinality_times_element_width() {
        let arr = Type::Array {
            index: Box::new(Type::Range { lo: 0, hi: 3 }),
            element: Box::new(Type::Boolean),
        };
        assert_eq!(encoded_width(&arr, false), 4 * 1);
    }

    #[test]
    fn record_reordering_sorts_widest_field_first() {
        let fields = vec![
            ("a".to_string(), Type::Boolean),
            ("b".to_string(), Type::Range { lo: 0, hi: 255 }),
            ("c".to_string(), Type::Range { lo: 0, hi: 3 }),
        ];
        let (reordered, changed) = reorder_record_fields(&fields);
        assert!(changed);
        assert_eq!(reordered[0].0, "b");
        assert_eq!(reordered[1].0, "c");
        assert_eq!(reordered[2].0, "a");
    }

    #[test]
    fn record_reordering_reports_no_change_when_already_sorted() {
        let fields = vec![
            ("b".to_string(), Type::Range { lo: 0, hi: 255 }),
            ("a".to_string(), Type::Boolean),
        ];
        let (_, changed) = reorder_record_fields(&fields);
        assert!(!changed);
    }
}
