//! Subtree accessors (spec.md §4.4): walking an ordered path of object
//! keys into a JSON value.
//!
//! The source this spec was distilled from has a known typo in its
//! parent-walk loop (spec.md §9's "undefined identifier... appears to be a
//! typo for the loop variable"). There is nothing to carry forward here:
//! walking a `&mut Value` step by step and re-binding the same variable to
//! each child is exactly the pattern Rust's borrow checker requires to be
//! written correctly in the first place.

use serde_json::Value;

use crate::error::CacheKvError;

fn not_found(path: &[&str], up_to: usize) -> CacheKvError {
    CacheKvError::SubvalueNotFound { path: path[..=up_to].join(".") }
}

/// Walk `path` into `value`, failing if any intermediate node is absent or
/// not an object.
pub fn walk<'a>(value: &'a Value, path: &[&str]) -> Result<&'a Value, CacheKvError> {
    let mut current = value;
    for (i, segment) in path.iter().enumerate() {
        match current {
            Value::Object(map) => {
                current = map.get(*segment).ok_or_else(|| not_found(path, i))?;
            }
            _ => return Err(not_found(path, i)),
        }
    }
    Ok(current)
}

/// Same as [`walk`] but returns a mutable reference to the final node, for
/// `set_sub`'s read-modify-write.
pub fn walk_mut<'a>(value: &'a mut Value, path: &[&str]) -> Result<&'a mut Value, CacheKvError> {
    let mut current = value;
    for (i, segment) in path.iter().enumerate() {
        match current {
            Value::Object(map) => {
                current = map.get_mut(*segment).ok_or_else(|| not_found(path, i))?;
            }
            _ => return Err(not_found(path, i)),
        }
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn walks_nested_object() {
        let value = json!({"a": {"b": 1, "c": 2}});
        assert_eq!(walk(&value, &["a", "b"]).unwrap(), &json!(1));
    }

    #[test]
    fn missing_intermediate_fails_with_joined_path() {
        let value = json!({"a": {"b": 1}});
        let err = walk(&value, &["a", "x", "y"]).unwrap_err();
        match err {
            CacheKvError::SubvalueNotFound { path } => assert_eq!(path, "a.x"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn walk_mut_allows_in_place_update() {
        let mut value = json!({"a": {"b": 1, "c": 2}});
        *walk_mut(&mut value, &["a", "b"]).unwrap() = json!(42);
        assert_eq!(value, json!({"a": {"b": 42, "c": 2}}));
    }

    #[test]
    fn non_object_intermediate_fails() {
        let value = json!({"a": 1});
        let err = walk(&value, &["a", "b"]).unwrap_err();
        match err {
            CacheKvError::SubvalueNotFound { path } => assert_eq!(path, "a.b"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
