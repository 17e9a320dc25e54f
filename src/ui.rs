use colored::Colorize;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Warning line as drawn above the progress bars
pub fn warning_line(msg: &str) -> String {
    format!("{} {}", "⚠".yellow(), msg)
}

/// Shorten text for a bar message, keeping the end
pub fn truncate(text: &str, max_len: usize) -> String {
    let count = text.chars().count();
    if count <= max_len {
        text.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let tail: String = text.chars().skip(count - (max_len - 3)).collect();
        format!("...{tail}")
    }
}

/// Summary counts, skipping zeros
pub fn counts(pairs: &[(&str, usize)]) -> String {
    let parts: Vec<String> = pairs
        .iter()
        .filter(|(_, n)| *n > 0)
        .map(|(label, n)| format!("{n} {label}"))
        .collect();
    if parts.is_empty() {
        "nothing to do".to_string()
    } else {
        parts.join(", ")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short() {
        assert_eq!(truncate("Lists/Projects", 20), "Lists/Projects");
        assert_eq!(truncate("exact", 5), "exact");
    }

    #[test]
    fn test_truncate_long() {
        assert_eq!(
            truncate("https://contoso.sharepoint.com/sites/first", 15),
            ".../sites/first"
        );
    }

    #[test]
    fn test_truncate_edge_cases() {
        assert_eq!(truncate("test", 3), "...");
        assert_eq!(truncate("", 10), "");
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("ääääää", 5), "...ää");
    }

    #[test]
    fn test_counts() {
        assert_eq!(
            counts(&[("created", 3), ("modified", 0), ("failed", 1)]),
            "3 created, 1 failed"
        );
        assert_eq!(counts(&[("created", 0)]), "nothing to do");
    }
}
