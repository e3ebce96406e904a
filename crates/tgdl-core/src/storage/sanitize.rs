//! Name sanitization for on-disk folders and files.

/// Maps every character outside `[alphanumeric, ' ', '_', '-']` to `_`.
/// Used for the per-source folder name.
pub fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Sanitizes a remote filename for safe use on Linux.
///
/// - Replaces NUL, `/`, `\` and control characters with `_`
/// - Collapses runs of replaced characters into one `_`
/// - Trims leading/trailing spaces, dots and underscores
/// - Limits length to 255 bytes (Linux NAME_MAX)
pub fn sanitize_filename(name: &str) -> String {
    const NAME_MAX: usize = 255;

    let mut out = String::with_capacity(name.len());
    let mut prev_replaced = false;
    for c in name.chars() {
        if c == '/' || c == '\\' || c.is_control() {
            if !prev_replaced {
                out.push('_');
            }
            prev_replaced = true;
        } else {
            out.push(c);
            prev_replaced = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == ' ' || c == '.' || c == '_');
    if trimmed.len() <= NAME_MAX {
        return trimmed.to_string();
    }
    let mut take = NAME_MAX;
    while !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    trimmed[..take].to_string()
}
