use std::collections::HashMap;
use std::hash::Hash;
use std::slice::Chunks;

use crate::db::error::{ DbError, DbResult };

/// Number of round trips needed for `len` items in chunks of `size`
pub fn chunk_count(len: usize, size: usize) -> usize {
    if size == 0 {
        return 0;
    }
    (len + size - 1) / size
}

/// Split items into chunks of at most `size`, rejecting a zero size
pub fn chunks<T>(items: &[T], size: usize) -> DbResult<Chunks<'_, T>> {
    if size == 0 {
        return Err(DbError::InvalidArgument("batch size must be at least 1".to_string()));
    }
    Ok(items.chunks(size))
}

/// Keep only the last occurrence of each key, in input order.
///
/// A set-based statement touches each target row once, so repeated keys
/// inside one chunk have to be collapsed to the write that would land last.
pub fn last_by_key<T, K, F>(items: &[T], key: F) -> Vec<&T> where K: Eq + Hash, F: Fn(&T) -> K {
    let mut last: HashMap<K, usize> = HashMap::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        last.insert(key(item), idx);
    }

    items
        .iter()
        .enumerate()
        .filter(|(idx, item)| last.get(&key(item)) == Some(idx))
        .map(|(_, item)| item)
        .collect()
}
