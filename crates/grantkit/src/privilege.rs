//! Privilege string normalization.
//!
//! The server and the declared configuration spell the same privilege in
//! different ways (`select`, `` `SELECT` ``, `SELECT (b,a)`, `SELECT(a, b)`).
//! Everything that compares privileges goes through [`normalize`] first so
//! that textual noise never shows up as a change.
//!
//! Column names are case-insensitive on the server, so they are folded to
//! lower case while the privilege keyword is folded to upper case.

use regex::Regex;
use std::sync::LazyLock;

/// `NAME(col, col, ...)` with no parenthesis inside the name.
static COLUMN_PRIVILEGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^(]+)\((.*)\)$").expect("valid column privilege regex"));

/// Canonicalize a single privilege string.
///
/// Surrounding backticks and spaces are trimmed and the keyword is
/// upper-cased. Column-scoped privileges get their column list lower-cased,
/// sorted and rejoined with `", "`:
///
/// ```
/// use grantkit::privilege::normalize;
///
/// assert_eq!(normalize("select(b,a,c)"), "SELECT(a, b, c)");
/// assert_eq!(normalize("SELECT (a, B, c)"), "SELECT(a, b, c)");
/// assert_eq!(normalize(" `delete` "), "DELETE");
/// ```
pub fn normalize(raw: &str) -> String {
    let trimmed = trim_quoting(raw);

    let Some(caps) = COLUMN_PRIVILEGE.captures(trimmed) else {
        return trimmed.to_uppercase();
    };

    let name = caps[1].trim_matches(' ');
    if name.is_empty() {
        return trimmed.to_uppercase();
    }

    let mut columns: Vec<String> = caps[2]
        .split(',')
        .map(|column| trim_quoting(column).to_lowercase())
        .collect();
    columns.sort_unstable();

    format!("{}({})", name.to_uppercase(), columns.join(", "))
}

/// Normalize every privilege and return them sorted.
///
/// Duplicates are kept.
pub fn normalize_all<S: AsRef<str>>(raws: &[S]) -> Vec<String> {
    let mut privileges: Vec<String> = raws.iter().map(|p| normalize(p.as_ref())).collect();
    privileges.sort();
    privileges
}

/// Split a comma-separated privilege list, keeping column lists together.
///
/// ```
/// use grantkit::privilege::split_list;
///
/// assert_eq!(split_list("SELECT(b,a),INSERT"), ["SELECT(b,a)", "INSERT"]);
/// ```
pub fn split_list(raw: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in raw.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                items.push(raw[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(raw[start..].trim());

    items.retain(|item| !item.is_empty());
    items
}

fn trim_quoting(s: &str) -> &str {
    s.trim_matches(|c| c == '`' || c == ' ')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_plain_privilege() {
        assert_eq!(normalize("DELETE"), "DELETE");
        assert_eq!(normalize("delete"), "DELETE");
        assert_eq!(normalize("  Select_Priv "), "SELECT_PRIV");
        assert_eq!(normalize("`usage`"), "USAGE");
    }

    #[test]
    fn test_normalize_column_privilege_order_and_spacing() {
        let expected = "SELECT(a, b, c)";
        assert_eq!(normalize("select(b,a,c)"), expected);
        assert_eq!(normalize("SELECT (a, b, c)"), expected);
        assert_eq!(normalize("SELECT(`c`, `a`,b)"), expected);
        assert_eq!(normalize("`select(c,b,a)`"), expected);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in [
            "select(b,a,c)",
            "SELECT (a, b, c)",
            "DELETE",
            " `insert` ",
            "UPDATE(z, y)",
            "select(ID, Name)",
            "(a,b)",
            "ALL PRIVILEGES",
        ] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "input {raw:?}");
        }
    }

    #[test]
    fn test_normalize_folds_column_case() {
        assert_eq!(normalize("select(ID)"), "SELECT(id)");
        assert_eq!(normalize("SELECT(id)"), "SELECT(id)");
        assert_eq!(normalize("update(Name, email)"), "UPDATE(email, name)");
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("SELECT,INSERT"), vec!["SELECT", "INSERT"]);
        assert_eq!(
            split_list("select(b,a), INSERT, update(c)"),
            vec!["select(b,a)", "INSERT", "update(c)"]
        );
        assert_eq!(split_list("Select_priv"), vec!["Select_priv"]);
        assert!(split_list("").is_empty());
        assert_eq!(split_list("SELECT,,INSERT,"), vec!["SELECT", "INSERT"]);
    }

    #[test]
    fn test_normalize_without_name_is_left_alone() {
        assert_eq!(normalize("(b,a)"), "(B,A)");
    }

    #[test]
    fn test_normalize_all_sorts_and_keeps_duplicates() {
        let privileges = normalize_all(&["update", "SELECT", "insert", "select"]);
        assert_eq!(privileges, vec!["INSERT", "SELECT", "SELECT", "UPDATE"]);
    }

    #[test]
    fn test_normalize_all_empty() {
        let privileges = normalize_all::<&str>(&[]);
        assert!(privileges.is_empty());
    }
}
