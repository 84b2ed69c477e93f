//! Fuzzy hostname comparison.
//!
//! Grid hosts are named inconsistently: the catalog may report a fully
//! qualified name while the operator types the short one. Two names match
//! when they are equal, or when exactly one of them contains a dot and that
//! dotted name contains the other as a substring.

/// Compare two host names with the grid's fuzzy rule.
pub fn compare_host_names(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }

    match (a.contains('.'), b.contains('.')) {
        (true, false) => a.contains(b),
        (false, true) => b.contains(a),
        _ => false,
    }
}

/// Returns true if `host` fuzzily matches any entry of `hosts`.
pub fn is_host_in_list<S: AsRef<str>>(host: &str, hosts: &[S]) -> bool {
    hosts.iter().any(|h| compare_host_names(host, h.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match() {
        assert!(compare_host_names("alpha", "alpha"));
        assert!(compare_host_names("alpha.example.org", "alpha.example.org"));
    }

    #[test]
    fn short_name_matches_qualified() {
        assert!(compare_host_names("alpha", "alpha.example.org"));
        assert!(compare_host_names("alpha.example.org", "alpha"));
    }

    #[test]
    fn two_qualified_names_must_be_equal() {
        assert!(!compare_host_names("alpha.example.org", "alpha.example"));
        assert!(!compare_host_names("a.b", "a.b.c"));
    }

    #[test]
    fn two_short_names_must_be_equal() {
        assert!(!compare_host_names("alpha", "alphabet"));
    }

    #[test]
    fn substring_rule_is_not_anchored() {
        // A short name anywhere inside the dotted name matches.
        assert!(compare_host_names("example", "alpha.example.org"));
        assert!(!compare_host_names("gamma", "alpha.example.org"));
    }

    #[test]
    fn list_membership() {
        let hosts = vec!["alpha.example.org".to_string(), "beta".to_string()];
        assert!(is_host_in_list("alpha", &hosts));
        assert!(is_host_in_list("beta.example.org", &hosts));
        assert!(!is_host_in_list("gamma", &hosts));

        let empty: [&str; 0] = [];
        assert!(!is_host_in_list("alpha", &empty));
    }
}
