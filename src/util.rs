/// Removes every element matching `pred` from `items`, keeping the order of
/// the rest. Returns how many elements were removed.
pub fn remove_if<T, F>(items: &mut Vec<T>, mut pred: F) -> usize
where
    F: FnMut(&T) -> bool,
{
    let before = items.len();
    items.retain(|item| !pred(item));
    before - items.len()
}
