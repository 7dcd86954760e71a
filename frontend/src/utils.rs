//! Collection helpers shared by selection, proxy editing and id assignment.
//!
//! All functions are pure apart from mutating the sequence they are handed.

use crate::error::{ToolkitError, ToolkitResult};
use serde_json::Value;
use shared::{Identified, Record, ShapeError};
use std::cmp::Ordering;

/// Inverts membership of `item`: removes its first occurrence if present,
/// appends it otherwise. Order of the other items is untouched.
pub fn toggle_by_value<T: PartialEq>(items: &mut Vec<T>, item: T) -> &mut Vec<T> {
    match items.iter().position(|existing| *existing == item) {
        Some(index) => {
            items.remove(index);
        }
        None => items.push(item),
    }
    items
}

/// Like [`toggle_by_value`] but membership is decided by `key`. Toggling off
/// removes the matching element already in `items`, not `item` itself.
pub fn toggle_by_key<T, K, F>(items: &mut Vec<T>, item: T, key: F) -> &mut Vec<T>
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    let wanted = key(&item);
    match items.iter().position(|existing| key(existing) == wanted) {
        Some(index) => {
            items.remove(index);
        }
        None => items.push(item),
    }
    items
}

/// Key toggle over backend records, comparing a single named field.
pub fn toggle_by_field<'a>(
    items: &'a mut Vec<Record>,
    item: Record,
    field: &str,
) -> Result<&'a mut Vec<Record>, ShapeError> {
    let wanted = item.field(field).ok_or_else(|| ShapeError::MissingField {
        field: field.to_string(),
    })?;
    match items
        .iter()
        .position(|existing| existing.field(field).as_ref() == Some(&wanted))
    {
        Some(index) => {
            items.remove(index);
        }
        None => items.push(item),
    }
    Ok(items)
}

pub fn exists_by_key<T, K, F>(items: &[T], key: F, value: &K) -> bool
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    items.iter().any(|item| key(item) == *value)
}

pub fn exists_by_field(items: &[Record], field: &str, value: &Value) -> bool {
    items
        .iter()
        .any(|item| item.field(field).as_ref() == Some(value))
}

/// Id for the next record appended to `items`: one past the last id, or 1.
/// Fails when the last id is already `u64::MAX`.
pub fn next_id<T: Identified>(items: &[T]) -> ToolkitResult<u64> {
    match items.last() {
        None => Ok(1),
        Some(last) => successor(last.id()),
    }
}

/// [`next_id`] over raw backend JSON, validating the last element's shape.
pub fn next_id_from_values(items: Option<&[Value]>) -> ToolkitResult<u64> {
    match items.and_then(<[Value]>::last) {
        None => Ok(1),
        Some(last) => successor(Record::try_from(last.clone())?.id),
    }
}

fn successor(last: u64) -> ToolkitResult<u64> {
    last.checked_add(1).ok_or(ToolkitError::IdExhausted { last })
}

/// Circular successor of `current`, wrapping from the last position to 0.
pub fn advance_position<T>(items: &[T], current: usize) -> ToolkitResult<usize> {
    if items.is_empty() {
        return Err(ToolkitError::EmptyCollection);
    }
    let next = current.saturating_add(1);
    Ok(if next > items.len() - 1 { 0 } else { next })
}

/// Circular predecessor of `current`, wrapping from 0 to the last position.
/// A `current` past the end lands on the last position.
pub fn retreat_position<T>(items: &[T], current: usize) -> ToolkitResult<usize> {
    if items.is_empty() {
        return Err(ToolkitError::EmptyCollection);
    }
    let last = items.len() - 1;
    Ok(match current.checked_sub(1) {
        Some(previous) => previous.min(last),
        None => last,
    })
}

/// Numeric sort in place. Uses the stable slice sort, so equal values keep
/// their relative order; incomparable values (NaN) count as equal.
pub fn sort_by<T: PartialOrd>(items: &mut [T], ascending: bool) -> &mut [T] {
    items.sort_by(|a, b| {
        let ordering = a.partial_cmp(b).unwrap_or(Ordering::Equal);
        if ascending { ordering } else { ordering.reverse() }
    });
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::Proxy;

    fn record(value: Value) -> Record {
        Record::try_from(value).unwrap()
    }

    #[test]
    fn toggle_by_value_inverts_membership() {
        let mut items = vec![1, 2, 3];
        toggle_by_value(&mut items, 2);
        assert_eq!(items, vec![1, 3]);
        toggle_by_value(&mut items, 2);
        assert_eq!(items, vec![1, 3, 2]);
    }

    #[test]
    fn double_toggle_restores_membership() {
        for x in 0..5 {
            let mut items = vec![4, 0, 2];
            let was_member = items.contains(&x);
            toggle_by_value(&mut items, x);
            assert_ne!(items.contains(&x), was_member);
            toggle_by_value(&mut items, x);
            assert_eq!(items.contains(&x), was_member);
            assert!(items.iter().filter(|item| **item == x).count() <= 1);
        }
    }

    #[test]
    fn toggle_by_value_removes_only_first_occurrence() {
        let mut items = vec!["a", "b", "a"];
        toggle_by_value(&mut items, "a");
        assert_eq!(items, vec!["b", "a"]);
    }

    #[test]
    fn toggle_by_field_matches_on_key_only() {
        let mut items = vec![record(json!({ "id": 1, "name": "a" }))];
        let result = toggle_by_field(&mut items, record(json!({ "id": 1, "name": "b" })), "id").unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn toggle_by_field_appends_unchanged_item() {
        let mut items = vec![record(json!({ "id": 1, "name": "a" }))];
        let incoming = record(json!({ "id": 2, "name": "b" }));
        toggle_by_field(&mut items, incoming.clone(), "name").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1], incoming);
    }

    #[test]
    fn toggle_by_field_rejects_item_without_field() {
        let mut items = vec![record(json!({ "id": 1, "name": "a" }))];
        let error = toggle_by_field(&mut items, Record::new(9), "name").unwrap_err();
        assert_eq!(error, ShapeError::MissingField { field: "name".to_string() });
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn toggle_by_key_removes_existing_match() {
        let mut proxies = vec![Proxy::empty(1), Proxy::empty(2)];
        let replacement = Proxy {
            id: 2,
            netloc: Some("example.com".to_string()),
            address: None,
        };
        toggle_by_key(&mut proxies, replacement, |proxy| proxy.id);
        assert_eq!(proxies, vec![Proxy::empty(1)]);
    }

    #[test]
    fn exists_checks() {
        let items = vec![record(json!({ "id": 1, "name": "Google" }))];
        assert!(exists_by_field(&items, "name", &json!("Google")));
        assert!(!exists_by_field(&items, "name", &json!("Kendall")));
        assert!(!exists_by_field(&items, "label", &json!("Google")));

        let proxies = vec![Proxy::empty(3)];
        assert!(exists_by_key(&proxies, |proxy| proxy.id, &3));
        assert!(!exists_by_key(&proxies, |proxy| proxy.id, &4));
    }

    #[test]
    fn next_id_follows_last_element() {
        assert_eq!(next_id::<Proxy>(&[]).unwrap(), 1);
        assert_eq!(next_id(&[Proxy::empty(5), Proxy::empty(2)]).unwrap(), 3);
    }

    #[test]
    fn next_id_refuses_to_wrap() {
        assert!(matches!(
            next_id(&[Proxy::empty(u64::MAX)]),
            Err(ToolkitError::IdExhausted { last: u64::MAX })
        ));
        assert!(matches!(
            next_id_from_values(Some(&[json!({ "id": u64::MAX })])),
            Err(ToolkitError::IdExhausted { .. })
        ));
    }

    #[test]
    fn next_id_from_values_validates_shape() {
        assert_eq!(next_id_from_values(None).unwrap(), 1);
        assert_eq!(next_id_from_values(Some(&[])).unwrap(), 1);
        assert_eq!(
            next_id_from_values(Some(&[json!({ "id": 1 }), json!({ "id": 41 })])).unwrap(),
            42
        );
        assert!(matches!(
            next_id_from_values(Some(&[json!("proxy")])),
            Err(ToolkitError::Shape(ShapeError::NotARecord { .. }))
        ));
        assert!(matches!(
            next_id_from_values(Some(&[json!({ "id": null })])),
            Err(ToolkitError::Shape(ShapeError::MissingId { .. }))
        ));
    }

    #[test]
    fn circular_navigation_wraps_both_ways() {
        let items = ['a', 'b', 'c'];
        assert_eq!(advance_position(&items, 0).unwrap(), 1);
        assert_eq!(advance_position(&items, 2).unwrap(), 0);
        assert_eq!(retreat_position(&items, 0).unwrap(), 2);
        assert_eq!(retreat_position(&items, 2).unwrap(), 1);
    }

    #[test]
    fn circular_navigation_is_inverse_and_in_range() {
        let items = [10, 20, 30, 40];
        for position in 0..items.len() {
            let back = retreat_position(&items, position).unwrap();
            assert_eq!(advance_position(&items, back).unwrap(), position);
            let forward = advance_position(&items, position).unwrap();
            assert!(forward < items.len());
            assert_eq!(retreat_position(&items, forward).unwrap(), position);
        }
        assert_eq!(advance_position(&items, 99).unwrap(), 0);
        assert_eq!(retreat_position(&items, 99).unwrap(), 3);
    }

    #[test]
    fn circular_navigation_fails_on_empty() {
        let items: [u8; 0] = [];
        assert!(matches!(advance_position(&items, 0), Err(ToolkitError::EmptyCollection)));
        assert!(matches!(retreat_position(&items, 0), Err(ToolkitError::EmptyCollection)));
    }

    #[test]
    fn sort_by_both_directions() {
        let mut items = vec![3.0, 1.5, 2.0];
        assert_eq!(sort_by(&mut items, true), &[1.5, 2.0, 3.0]);
        assert_eq!(sort_by(&mut items, false), &[3.0, 2.0, 1.5]);
    }

    #[test]
    fn sort_by_is_stable() {
        #[derive(Debug, PartialEq)]
        struct Entry(u8, char);
        impl PartialOrd for Entry {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                self.0.partial_cmp(&other.0)
            }
        }
        let mut items = vec![Entry(2, 'a'), Entry(1, 'b'), Entry(2, 'c'), Entry(1, 'd')];
        sort_by(&mut items, true);
        assert_eq!(items, vec![Entry(1, 'b'), Entry(1, 'd'), Entry(2, 'a'), Entry(2, 'c')]);
    }
}
