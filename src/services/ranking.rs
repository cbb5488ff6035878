/// Orders items by descending weight.
///
/// Items with equal weight keep their relative position from the input, so
/// feeding the previous ranking back in never reshuffles ties. Sorting on
/// `(index, item)` pairs makes the tie-break explicit instead of relying on the
/// stability of the underlying sort.
pub fn rank_by_weight<T, F>(items: Vec<T>, weight: F) -> Vec<T>
where
    F: Fn(&T) -> usize,
{
    let mut indexed: Vec<(usize, usize, T)> = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| (weight(&item), index, item))
        .collect();

    indexed.sort_unstable_by(|(weight_a, index_a, _), (weight_b, index_b, _)| {
        weight_b.cmp(weight_a).then(index_a.cmp(index_b))
    });

    indexed.into_iter().map(|(_, _, item)| item).collect()
}
