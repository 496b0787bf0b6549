// src/utils/log.rs

//! Console helpers for human-facing CLI output.
//!
//! Diagnostics go through the `log` facade; these helpers print the framed
//! headers and summaries a person reads at the end of a command.

use chrono::Local;

fn stamp(message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!("[{}] {}", timestamp, message)
}

/// Print a framed header.
pub fn header(title: &str) {
    let border = "═".repeat(60);
    println!("{}", stamp(&border));
    println!("{}", stamp(&format!("  {}", title)));
    println!("{}", stamp(&border));
}

/// Print a numbered step of a multi-step command.
pub fn step(step_num: usize, total: usize, message: &str) {
    println!("{}", stamp(&format!("[STEP {}/{}] {}", step_num, total, message)));
}

/// Print an indented line under the previous one.
pub fn sub_item(message: &str) {
    println!("{}", stamp(&format!("    {}", message)));
}

/// Print a titled list of key/value pairs.
pub fn summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("{}", stamp(&format!("[SUMMARY] {}", title)));
    for line in summary_lines(items) {
        println!("{}", stamp(&line));
    }
}

fn summary_lines(items: &[(&str, String)]) -> Vec<String> {
    let width = items.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    items
        .iter()
        .map(|(key, value)| format!("    {:<width$}  {}", key, value, width = width))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lines_align_keys() {
        let lines = summary_lines(&[("Feeds", "3".into()), ("New articles", "12".into())]);
        assert_eq!(lines[0], "    Feeds         3");
        assert_eq!(lines[1], "    New articles  12");
    }

    #[test]
    fn test_stamp_keeps_message() {
        assert!(stamp("hello").ends_with("] hello"));
    }
}
