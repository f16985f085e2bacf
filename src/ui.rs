use colored::Colorize;

/// Width of the `=== host ===` banner
pub const BANNER_WIDTH: usize = 50;

/// Package lists longer than this are cut short unless asked otherwise
pub const LIST_LIMIT: usize = 400;

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

/// Print an error message, one red line per line of `msg`
pub fn error(msg: &str) {
    for line in msg.lines() {
        eprintln!("{} {}", "✗".red(), line.red());
    }
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

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a step indicator
pub fn step(num: usize, total: usize, msg: &str) {
    println!("{} {}", format!("[{num}/{total}]").blue().bold(), msg);
}

/// Print the banner that opens a host's section
pub fn host_banner(host: &str) {
    println!();
    println!("{}", banner_line(host, BANNER_WIDTH).yellow().bold());
}

/// `==== message ====`, padded to `width` with the extra `=` on the right
pub fn banner_line(message: &str, width: usize) -> String {
    let fill = width.saturating_sub(message.chars().count() + 2);
    let left = fill / 2;
    format!("{} {} {}", "=".repeat(left), message, "=".repeat(fill - left))
}

/// Join `items` with commas, cutting off once their combined length
/// reaches `limit`
pub fn truncated_list<S: AsRef<str>>(items: &[S], limit: Option<usize>) -> String {
    let Some(limit) = limit else {
        return join(items.iter().map(AsRef::as_ref));
    };

    let mut shown: Vec<String> = Vec::new();
    let mut length = 0;
    for item in items {
        length += item.as_ref().chars().count();
        if length < limit {
            shown.push(item.as_ref().to_string());
        } else {
            shown.push(format!("... ({} more)", items.len() - shown.len()));
            break;
        }
    }
    join(shown.iter().map(String::as_str))
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(", ")
}

// ============================================================================
// Tests
// ============================================================================
