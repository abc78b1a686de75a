/// Sidebar preview: first `max` characters of the content with an
/// ellipsis when truncated. Char-based so multi-byte input never
/// splits a code point.
pub(crate) fn content_preview(content: &str, max: usize) -> String {
    if content.chars().count() <= max {
        return content.to_string();
    }
    let head: String = content.chars().take(max).collect();
    format!("{}...", head)
}

const AVATAR_COLORS: [&str; 5] = ["#FF5733", "#33FF57", "#3357FF", "#FF33A8", "#FFC733"];

/// Stable per-user avatar color: sum of char codes over a fixed
/// palette, so every client renders the same color for a given name.
pub(crate) fn avatar_color(username: &str) -> &'static str {
    let hash: usize = username.chars().map(|c| c as usize).sum();
    AVATAR_COLORS[hash % AVATAR_COLORS.len()]
}

pub(crate) fn avatar_initial(username: &str) -> String {
    username
        .chars()
        .next()
        .map(|c| c.to_uppercase().to_string())
        .unwrap_or_default()
}
