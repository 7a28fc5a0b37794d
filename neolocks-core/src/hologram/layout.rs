//! Label text normalization and vertical stacking.

/// Normalize the raw fields of a label form into the lines to display.
///
/// Each field is trimmed and cut to `max_len` characters (never wrapped).
/// Only the maximal run of non-empty fields starting at the first one is
/// kept: `["A", "", "C"]` yields `["A"]`, and all-empty input yields nothing.
/// Missing fields count as empty.
#[must_use]
pub fn materialize_lines<S: AsRef<str>>(fields: &[Option<S>], max_len: usize) -> Vec<String> {
    fields
        .iter()
        .map(|field| field.as_ref().map_or("", |s| AsRef::<str>::as_ref(s)).trim())
        .take_while(|line| !line.is_empty())
        .map(|line| truncate_chars(line, max_len))
        .collect()
}

/// The first `max_len` characters of `line`.
#[must_use]
pub fn truncate_chars(line: &str, max_len: usize) -> String {
    match line.char_indices().nth(max_len) {
        Some((cut, _)) => line[..cut].to_string(),
        None => line.to_string(),
    }
}

/// Vertical offset of line `index` in a stack of `count` lines.
///
/// `((count - 1 - index) - floor((count - 1) / 2)) * spacing`: the first line
/// is on top and the stack is centered on the anchor.
#[must_use]
pub fn line_offset(index: usize, count: usize, spacing: f64) -> f64 {
    debug_assert!(index < count);
    let last = count.saturating_sub(1);
    let from_bottom = last.saturating_sub(index) as f64;
    let center = (last / 2) as f64;
    (from_bottom - center) * spacing
}
