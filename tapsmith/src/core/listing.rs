//! Hygiene helpers for BASIC listings.
//!
//! Collaborator replies arrive as free text and may carry Markdown fences,
//! stray blank lines, or trailing whitespace. These helpers clean a reply
//! into a candidate listing and report shallow shape problems for logging.
//! None of this is a BASIC parser: the assembler owns syntax.

/// Normalize a collaborator reply into a candidate listing.
///
/// Line endings become `\n`, Markdown fence lines are dropped, blank lines
/// are dropped (tape programs have one logical line per physical line and no
/// gaps), and trailing whitespace is trimmed from each line. A non-empty
/// result always ends with a newline.
pub fn normalize_listing(raw: &str) -> String {
    let mut out = String::new();
    for line in raw.replace("\r\n", "\n").replace('\r', "\n").lines() {
        let line = line.trim_end();
        if line.is_empty() || line.trim_start().starts_with("```") {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Count the logical program lines in a listing.
pub fn line_count(listing: &str) -> usize {
    listing.lines().filter(|line| !line.trim().is_empty()).count()
}

/// 1-indexed positions of listing lines that do not begin with a BASIC line
/// number. Used for warnings only; the assembler makes the final call.
pub fn lines_without_numbers(listing: &str) -> Vec<usize> {
    use std::sync::LazyLock;
    static LINE_NUMBER_RE: LazyLock<regex::Regex> =
        LazyLock::new(|| regex::Regex::new(r"^\s*\d+").unwrap());

    listing
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty() && !LINE_NUMBER_RE.is_match(line))
        .map(|(i, _)| i + 1)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_fences_and_blank_lines() {
        let raw = "```basic\n10 PRINT \"HI\"\n\n20 GO TO 10\n```\n";
        assert_eq!(normalize_listing(raw), "10 PRINT \"HI\"\n20 GO TO 10\n");
    }

    #[test]
    fn normalize_handles_crlf_and_trailing_spaces() {
        let raw = "10 PRINT \"HI\"   \r\n20 STOP\r\n";
        assert_eq!(normalize_listing(raw), "10 PRINT \"HI\"\n20 STOP\n");
    }

    #[test]
    fn normalize_of_empty_reply_is_empty() {
        assert_eq!(normalize_listing("```\n```"), "");
        assert_eq!(normalize_listing(""), "");
    }

    #[test]
    fn line_count_ignores_blanks() {
        assert_eq!(line_count("10 PRINT\n20 STOP\n"), 2);
        assert_eq!(line_count(""), 0);
    }

    #[test]
    fn unnumbered_lines_are_reported_one_indexed() {
        let listing = "10 PRINT \"HI\"\nREM stray\n30 STOP\n";
        assert_eq!(lines_without_numbers(listing), vec![2]);
    }

    #[test]
    fn numbered_lines_with_leading_spaces_are_fine() {
        assert!(lines_without_numbers("  10 PRINT \"HI\"\n").is_empty());
    }
}
