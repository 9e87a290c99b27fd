//! In-place quicksort
//!
//! General-purpose sorting primitive used for draw ordering. Uses a Lomuto
//! partition with the last element as pivot, recurses into the smaller
//! partition and loops on the larger one so stack depth stays around
//! `log2(n)`. Not stable.

/// Sort `items` in place so that no element is `less` than its predecessor.
///
/// # Arguments
/// * `items` - Slice to sort
/// * `less` - Strict "sorts before" predicate; any extra parameters (such as a
///   camera position) are captured by the closure
pub fn quicksort<T, F>(items: &mut [T], mut less: F)
where
    F: FnMut(&T, &T) -> bool,
{
    quicksort_range(items, &mut less);
}

fn quicksort_range<T, F>(mut items: &mut [T], less: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    while items.len() > 1 {
        let pivot = partition(items, less);
        let (left, right) = std::mem::take(&mut items).split_at_mut(pivot);
        let right = &mut right[1..];

        if left.len() < right.len() {
            quicksort_range(left, less);
            items = right;
        } else {
            quicksort_range(right, less);
            items = left;
        }
    }
}

/// Lomuto partition around the last element, returns the pivot's final index
fn partition<T, F>(items: &mut [T], less: &mut F) -> usize
where
    F: FnMut(&T, &T) -> bool,
{
    let last = items.len() - 1;
    let mut store = 0;
    for i in 0..last {
        if less(&items[i], &items[last]) {
            items.swap(i, store);
            store += 1;
        }
    }
    items.swap(store, last);
    store
}
