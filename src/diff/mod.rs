//! Dirty-diff engine
//!
//! Pure functions over the whitelisted content fields: copying them between
//! records, force-restoring defaults when applying a historical version, and
//! computing the minimal changed set against a saved baseline. The whitelist
//! is enforced by the key type; a `FieldMap` cannot hold anything else.

use crate::types::{ContentField, FieldMap, Item};

/// Copy every field present in `src` onto `dest`.
///
/// Fields of `dest` that `src` does not carry are left untouched; keys are
/// never removed.
pub fn extend(dest: &mut FieldMap, src: &FieldMap) {
    for (field, value) in src {
        dest.insert(*field, value.clone());
    }
}

/// Apply `src` onto `dest`, forcing defaults for fields `src` cleared.
///
/// For every whitelisted field: if `dest` already has a value, it takes
/// `src`'s value when present and otherwise resets to the field's default.
/// If `dest` has no value, it adopts `src`'s value only when present; a
/// default is never fabricated for a field that was unset on both sides.
/// This restores a historical version cleanly: fields the old version had
/// cleared go back to their defaults instead of keeping newer content.
pub fn forced_extend(dest: &mut FieldMap, src: &FieldMap) {
    for field in ContentField::ALL {
        match (dest.contains_key(&field), src.get(&field)) {
            (true, Some(value)) => {
                dest.insert(field, value.clone());
            }
            (true, None) => {
                dest.insert(field, field.default_value());
            }
            (false, Some(value)) => {
                dest.insert(field, value.clone());
            }
            (false, None) => {}
        }
    }
}

/// Compute the minimal save payload: the working copy's content fields with
/// every key dropped whose value is deep-equal to the baseline's.
///
/// Without a baseline no pruning happens and the full content copy is
/// returned. The item id never participates; it is carried alongside the
/// diff when routing the update.
pub fn compute_save_diff(orig: Option<&Item>, item: &Item) -> FieldMap {
    let mut diff = FieldMap::new();
    extend(&mut diff, &item.fields);
    if let Some(orig) = orig {
        diff.retain(|field, value| orig.fields.get(field) != Some(&*value));
    }
    diff
}
