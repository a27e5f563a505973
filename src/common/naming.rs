//! Naming conventions used when matching members by name
use itertools::Itertools;
use regex::Regex;

lazy_static! {
    static ref PASCAL_IDENT: Regex = Regex::new(r"^\p{Lu}[\p{L}\p{Nd}_]*$").unwrap();
}

/// Split a PascalCase member name into its words
///
/// `ChildValue` becomes `["Child", "Value"]`, `HTTPCode` becomes
/// `["HTTP", "Code"]`.
pub fn split_pascal_case(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let chars: Vec<char> = name.chars().collect();
    let mut start = 0;
    for i in 1..chars.len() {
        let prev = chars[i - 1];
        let cur = chars[i];
        let next = chars.get(i + 1).copied();
        let boundary = (cur.is_uppercase() && (prev.is_lowercase() || prev.is_ascii_digit()))
            || (cur.is_uppercase()
                && prev.is_uppercase()
                && next.map(|n| n.is_lowercase()).unwrap_or(false));
        if boundary {
            words.push(chars[start..i].iter().collect());
            start = i;
        }
    }
    if start < chars.len() {
        words.push(chars[start..].iter().collect());
    }
    words
}

/// True if the name looks like a PascalCase identifier at all
pub fn is_pascal_case(name: &str) -> bool {
    PASCAL_IDENT.is_match(name)
}

/// Edit distance between member names, ignoring ASCII case
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().map(|c| c.to_ascii_lowercase()).collect();
    let b: Vec<char> = b.chars().map(|c| c.to_ascii_lowercase()).collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = diagonal + usize::from(ca != cb);
            diagonal = row[j + 1];
            row[j + 1] = substitution.min(row[j] + 1).min(diagonal + 1);
        }
    }
    row[b.len()]
}

/// Up to `limit` member names within `max_distance` edits of `name`,
/// nearest first
pub fn suggest_similar(
    name: &str,
    candidates: &[String],
    limit: usize,
    max_distance: usize,
) -> Vec<String> {
    candidates
        .iter()
        .filter(|c| c.as_str() != name)
        .map(|c| (edit_distance(name, c), c))
        .filter(|(d, _)| *d <= max_distance)
        .sorted()
        .take(limit)
        .map(|(_, c)| c.clone())
        .collect()
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    pub fn test_split_pascal_case() {
        assert_eq!(split_pascal_case("ChildValue"), vec!["Child", "Value"]);
        assert_eq!(split_pascal_case("Value"), vec!["Value"]);
        assert_eq!(split_pascal_case("HTTPCode"), vec!["HTTP", "Code"]);
        assert_eq!(
            split_pascal_case("OrderCustomerName"),
            vec!["Order", "Customer", "Name"]
        );
        assert!(is_pascal_case("ChildValue"));
        assert!(!is_pascal_case("childValue"));
    }

    #[test]
    pub fn test_suggestions() {
        let candidates = vec!["Value".to_string(), "Child".to_string(), "Name".to_string()];
        assert_eq!(suggest_similar("Valeu", &candidates, 3, 2), vec!["Value"]);
        assert!(suggest_similar("Zzzzzzz", &candidates, 3, 2).is_empty());
        assert_eq!(suggest_similar("childvalue", &["ChildValue".to_string()], 3, 0), vec!["ChildValue"]);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
    }
}
