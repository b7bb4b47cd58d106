/// Offsets still needed after the first page: `page_size, 2 * page_size, ...`
/// while below `total`. Offset 0 is never part of the plan.
pub fn plan_offsets(total: i64, page_size: u64) -> Vec<u64> {
    if total <= 0 || page_size == 0 {
        return Vec::new();
    }
    let total = total as u64;
    (1..)
        .map(|page| page * page_size)
        .take_while(|offset| *offset < total)
        .collect()
}
