//! Offset arithmetic inside a composite (array/record) value.
//!
//! State-variable top-level offsets come straight from
//! `CompiledModel::state_var`; this module handles the arithmetic
//! *inside* a record or array once a path walks into it, reusing the
//! same field order the layout planner's debug diagnostic reports
//! (widest field first, ties by declaration order).

use crate::ast::Type;
use crate::layout::{encoded_width, reorder_record_fields};

/// One field of a record, in its packed (not declaration) order.
pub struct FieldSlot {
    pub name: String,
    pub ty: Type,
    pub offset: u32,
    pub width: u32,
}

/// Lays out `fields` in descending-width order and returns each
/// field's offset relative to the record's own start.
pub fn record_layout(fields: &[(String, Type)]) -> Vec<FieldSlot> {
    let (ordered, _changed) = reorder_record_fields(fields);
    let mut offset = 0u32;
    let mut slots = Vec::with_capacity(ordered.len());
    for (name, ty) in ordered {
        let width = encoded_width(&ty, false);
        slots.push(FieldSlot { name, ty, offset, width });
        offset += width;
    }
    slots
}

/// The field slot named `field` within `fields`, if any.
pub fn find_field(fields: &[(String, Type)], field: &str) -> Option<FieldSlot> {
    record_layout(fields).into_iter().find(|s| s.name == field)
}

/// The per-element width of an array type, i.e. the width of one
/// occupant of the array's index range.
pub fn element_width(element: &Type) -> u32 {
    encoded_width(element, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_layout_packs_widest_field_first() {
        let fields = vec![
            ("a".to_string(), Type::Boolean),
            ("b".to_string(), Type::Range { lo: 0, hi: 255 }),
        ];
        let slots = record_layout(&fields);
        assert_eq!(slots[0].name, "b");
        assert_eq!(slots[0].offset, 0);
        assert_eq!(slots[1].name, "a");
        assert_eq!(slots[1].offset, 8);
    }

    #[test]
    fn find_field_locates_a_field_by_name_after_reordering() {
        let fields = vec![
            ("a".to_string(), Type::Boolean),
            ("b".to_string(), Type::Range { lo: 0, hi: 255 }),
        ];
        let slot = find_field(&fields, "a").unwrap();
        assert_eq!(slot.offset, 8);
    }
}
