//! Persisted display order of plugins: common names joined with `;`.

pub const ORDER_SEPARATOR: char = ';';

pub fn serialize_order<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for name in names {
        if !seen.iter().any(|s| s.eq_ignore_ascii_case(name)) {
            seen.push(name);
        }
    }
    seen.join(&ORDER_SEPARATOR.to_string())
}

pub fn parse_order(serialized: &str) -> Vec<String> {
    serialized
        .split(ORDER_SEPARATOR)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Sorts `items` by their position in `order`. Names missing from `order`
/// keep their relative order after the listed ones; names in `order` that
/// match no item are ignored.
pub fn apply_order<T>(items: &mut [T], order: &[String], name_of: impl Fn(&T) -> &str) {
    items.sort_by_key(|item| {
        let name = name_of(item);
        order
            .iter()
            .position(|o| o.eq_ignore_ascii_case(name))
            .unwrap_or(usize::MAX)
    });
}
