//! Text shaping applied to every snapshot before it reaches the display.

use crate::domain::models::TextProcessingOptions;

pub const ELLIPSIS: &str = "...";

/// Trim and cap to `max_chars` characters. Longer input is cut and suffixed
/// with [`ELLIPSIS`]; input at exactly the limit is left alone.
pub fn sanitize(raw: &str, max_chars: usize) -> String {
    let trimmed = raw.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(max_chars).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Apply the user's options. Line-count trims run first, then blank-line
/// removal, then line-break collapsing.
pub fn apply_options(text: &str, options: &TextProcessingOptions) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    if options.remove_first_line {
        let n = options.remove_first_line_count.min(lines.len());
        lines = lines.split_off(n);
    }
    if options.remove_last_line {
        let n = options.remove_last_line_count.min(lines.len());
        lines.truncate(lines.len() - n);
    }

    if options.remove_empty_lines {
        lines = lines
            .into_iter()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
    }

    if options.remove_line_breaks {
        return lines
            .into_iter()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
    }

    lines.join("\n")
}

/// Full pipeline: sanitize, then options.
pub fn process(raw: &str, max_chars: usize, options: &TextProcessingOptions) -> String {
    apply_options(&sanitize(raw, max_chars), options)
}
