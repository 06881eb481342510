//! Name heuristics shared by the resolver and the builder.

/// Singularize a table name into an association name.
///
/// Rules, first match wins: `ies` -> `y`; `ses`/`ches`/`xes` drop two
/// characters; a trailing lone `s` is dropped; anything else is unchanged.
/// A word ending in `ss` is not plural and stays as is.
pub fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{stem}y");
    }
    if word.ends_with("ses") || word.ends_with("ches") || word.ends_with("xes") {
        return word[..word.len() - 2].to_string();
    }
    if word.ends_with('s') && !word.ends_with("ss") {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

/// Turn a snake_case identifier into a display label (`order_items` -> `Order Items`).
pub fn humanize(identifier: &str) -> String {
    identifier
        .split('_')
        .filter(|part| !part.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
