/*!
format.rs

Human output primitives shared by the subcommands.

  - StyleOptions::detect()  (NO_COLOR / NO_EMOJI / COLUMNS; plain when piped)
  - StyleOptions::plain()   (no ANSI, no emoji; used by tests and pipes)
  - color(role, text, &style)
  - emoji(tag, &style)
  - box_header(title, subtitle, &style)
  - table(headers, rows, TableOpts, &style)   fixed-width columns
  - truncate_ellipsis / format_duration

JSON output paths (`--json`) must not go through these helpers.
*/

use std::borrow::Cow;
use std::io::IsTerminal;

/* -------------------------------------------------------------------------- */
/* Style Options                                                              */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone)]
pub struct StyleOptions {
    pub use_color: bool,
    pub use_emoji: bool,
    pub term_width: usize,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self::detect()
    }
}

impl StyleOptions {
    pub fn detect() -> Self {
        let width = std::env::var("COLUMNS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .map(|w| w.clamp(40, 220))
            .unwrap_or(100);

        if !std::io::stdout().is_terminal() {
            return StyleOptions {
                term_width: width,
                ..Self::plain()
            };
        }

        StyleOptions {
            use_color: std::env::var_os("NO_COLOR").is_none(),
            use_emoji: std::env::var_os("NO_EMOJI").is_none(),
            term_width: width,
        }
    }

    pub fn plain() -> Self {
        StyleOptions {
            use_color: false,
            use_emoji: false,
            term_width: 100,
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Color / Emoji                                                              */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy)]
pub enum Role {
    Primary,
    Secondary,
    Accent,
    Success,
    Warning,
    Error,
    Dim,
}

pub fn color(role: Role, text: impl AsRef<str>, style: &StyleOptions) -> String {
    if !style.use_color {
        return text.as_ref().to_string();
    }
    let code = match role {
        Role::Primary => "38;5;45",    // cyan
        Role::Secondary => "38;5;250", // gray
        Role::Accent => "38;5;213",    // magenta
        Role::Success => "38;5;82",    // green
        Role::Warning => "38;5;214",   // orange
        Role::Error => "38;5;196",     // red
        Role::Dim => "2",
    };
    format!("\x1b[{code}m{}\x1b[0m", text.as_ref())
}

pub fn emoji(tag: &str, style: &StyleOptions) -> &'static str {
    if !style.use_emoji {
        return "";
    }
    match tag {
        "success" => "✔",
        "error" => "✖",
        "warn" => "⚠",
        "info" => "ℹ",
        "rocket" => "🚀",
        "robot" => "🤖",
        "phone" => "📱",
        "image" => "🖼",
        "audio" => "🔊",
        "video" => "🎬",
        "clock" => "⏱",
        _ => "",
    }
}

/// Emoji followed by a space, or nothing when emoji are disabled.
pub fn emoji_prefix(tag: &str, style: &StyleOptions) -> String {
    let e = emoji(tag, style);
    if e.is_empty() {
        String::new()
    } else {
        format!("{e} ")
    }
}

/* -------------------------------------------------------------------------- */
/* Box Header                                                                 */
/* -------------------------------------------------------------------------- */

/// Single-line boxed title. Long content is truncated to the terminal width.
pub fn box_header(title: impl AsRef<str>, subtitle: Option<&str>, style: &StyleOptions) -> String {
    let max_inner = style.term_width.saturating_sub(4).max(10);

    let plain_len = display_width(title.as_ref())
        + subtitle.map(|s| display_width(s) + 2).unwrap_or(0);

    let (title_txt, sub_txt) = if plain_len > max_inner {
        let joined = match subtitle {
            Some(s) => format!("{}  {}", strip_ansi(title.as_ref()), strip_ansi(s)),
            None => strip_ansi(title.as_ref()).into_owned(),
        };
        (truncate_ellipsis(&joined, max_inner), None)
    } else {
        (title.as_ref().to_string(), subtitle.map(str::to_string))
    };

    let inner = match &sub_txt {
        Some(s) => format!(
            "{}  {}",
            color(Role::Primary, &title_txt, style),
            color(Role::Secondary, s, style)
        ),
        None => color(Role::Primary, &title_txt, style),
    };
    let width = display_width(&inner);

    format!(
        "┌{bar}┐\n│ {inner} │\n└{bar}┘",
        bar = "─".repeat(width + 2)
    )
}

/* -------------------------------------------------------------------------- */
/* Table Rendering                                                            */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone)]
pub struct TableOpts {
    /// 0 -> use the terminal width.
    pub max_width: usize,
    /// Hard cap per column before terminal fitting.
    pub max_col_width: usize,
    pub header_sep: bool,
    pub min_col_width: usize,
}

impl Default for TableOpts {
    fn default() -> Self {
        Self {
            max_width: 0,
            max_col_width: 40,
            header_sep: true,
            min_col_width: 3,
        }
    }
}

const COL_GAP: &str = "  ";

/// Compute fixed column widths: widest cell per column, capped, then shrunk
/// from the widest columns until the row fits the width limit.
fn column_widths(headers: &[&str], rows: &[Vec<String>], opts: &TableOpts, limit: usize) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| display_width(h)).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(headers.len()) {
            widths[i] = widths[i].max(display_width(cell));
        }
    }
    for w in widths.iter_mut() {
        *w = (*w).min(opts.max_col_width.max(opts.min_col_width));
    }

    let gaps = COL_GAP.len() * headers.len().saturating_sub(1);
    let mut total: usize = widths.iter().sum::<usize>() + gaps;
    while total > limit {
        let Some((idx, &widest)) = widths.iter().enumerate().max_by_key(|(_, w)| **w) else {
            break;
        };
        if widest <= opts.min_col_width {
            break;
        }
        widths[idx] -= 1;
        total -= 1;
    }
    widths
}

pub fn table(headers: &[&str], rows: &[Vec<String>], opts: TableOpts, style: &StyleOptions) -> String {
    if headers.is_empty() {
        return String::new();
    }
    let limit = if opts.max_width == 0 {
        style.term_width
    } else {
        opts.max_width.min(style.term_width)
    };
    let widths = column_widths(headers, rows, &opts, limit);

    let mut lines: Vec<String> = Vec::with_capacity(rows.len() + 2);

    let header_line = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| color(Role::Accent, fit(h, *w), style))
        .collect::<Vec<_>>()
        .join(COL_GAP);
    lines.push(header_line.trim_end().to_string());

    if opts.header_sep {
        let sep = widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join(COL_GAP);
        lines.push(color(Role::Dim, sep, style));
    }

    for row in rows {
        let line = widths
            .iter()
            .enumerate()
            .map(|(i, w)| fit(row.get(i).map(String::as_str).unwrap_or(""), *w))
            .collect::<Vec<_>>()
            .join(COL_GAP);
        lines.push(line.trim_end().to_string());
    }

    lines.join("\n")
}

/// Pad or truncate to exactly `width` display columns.
fn fit(s: &str, width: usize) -> String {
    let len = display_width(s);
    if len <= width {
        return format!("{s}{}", " ".repeat(width - len));
    }
    truncate_ellipsis(&strip_ansi(s), width)
}

/* -------------------------------------------------------------------------- */
/* Text Helpers                                                               */
/* -------------------------------------------------------------------------- */

pub fn truncate_ellipsis(s: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

/// Seconds as `12.3s`, or `4m 05s` past a minute.
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "-".into();
    }
    if seconds < 60.0 {
        return format!("{seconds:.1}s");
    }
    let total = seconds.round() as u64;
    format!("{}m {:02}s", total / 60, total % 60)
}

/* -------------------------------------------------------------------------- */
/* ANSI / Width Utilities                                                     */
/* -------------------------------------------------------------------------- */

fn strip_ansi(s: &str) -> Cow<'_, str> {
    if !s.contains('\x1b') {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            // CSI runs until its final letter.
            for t in chars.by_ref() {
                if t.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    Cow::Owned(out)
}

pub fn display_width(s: &str) -> usize {
    strip_ansi(s).chars().count()
}

/* -------------------------------------------------------------------------- */
/* Tests                                                                      */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_style_has_no_escapes() {
        let style = StyleOptions::plain();
        assert_eq!(color(Role::Error, "boom", &style), "boom");
        assert_eq!(emoji("success", &style), "");
        assert_eq!(emoji_prefix("success", &style), "");
    }

    #[test]
    fn box_header_wraps_title() {
        let b = box_header("Agents", Some("3 active"), &StyleOptions::plain());
        let lines: Vec<&str> = b.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("Agents  3 active"));
        assert_eq!(lines[0].chars().count(), lines[1].chars().count());
    }

    #[test]
    fn table_columns_are_fixed_width() {
        let t = table(
            &["NAME", "ROLE"],
            &[
                vec!["builder".into(), "build".into()],
                vec!["qa".into(), "test".into()],
            ],
            TableOpts::default(),
            &StyleOptions::plain(),
        );
        let lines: Vec<&str> = t.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("NAME     ROLE"));
        assert!(lines[1].starts_with("-------  ----"));
        assert!(lines[3].starts_with("qa       test"));
    }

    #[test]
    fn table_shrinks_to_width() {
        let long = "x".repeat(80);
        let t = table(
            &["A", "B"],
            &[vec![long.clone(), long]],
            TableOpts {
                max_width: 50,
                max_col_width: 100,
                ..Default::default()
            },
            &StyleOptions::plain(),
        );
        for line in t.lines() {
            assert!(line.chars().count() <= 50, "line too wide: {line}");
        }
        assert!(t.contains('…'));
    }

    #[test]
    fn truncate() {
        assert_eq!(truncate_ellipsis("abcdef", 4), "abc…");
        assert_eq!(truncate_ellipsis("abc", 4), "abc");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(12.34), "12.3s");
        assert_eq!(format_duration(125.0), "2m 05s");
        assert_eq!(format_duration(f64::NAN), "-");
    }

    #[test]
    fn strip_ansi_removes_csi() {
        assert_eq!(strip_ansi("\x1b[38;5;196mRED\x1b[0m"), "RED");
        assert_eq!(display_width("\x1b[1mab\x1b[0m"), 2);
    }
}
