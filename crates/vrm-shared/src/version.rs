use regex::Regex;
use std::cmp::Ordering;

/// Extract the dotted release number from a router template version string.
///
/// Templates report strings such as `"Cloudstack Release 4.2.1 Mon Jan 1"`;
/// only the first dotted numeric token is meaningful.
pub fn trim_router_version(raw: &str) -> Option<String> {
    let pattern = Regex::new(r"\d+(?:\.\d+)+").ok()?;
    pattern.find(raw).map(|m| m.as_str().to_string())
}

/// Compare dotted versions numerically, treating missing components as 0
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.')
            .map(|part| part.trim().parse::<u64>().unwrap_or(0))
            .collect()
    };
    let left = parse(a);
    let right = parse(b);
    let len = left.len().max(right.len());

    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Whether a router's template version satisfies the minimum
pub fn meets_minimum(template_version: Option<&str>, minimum: &str) -> bool {
    let Some(raw) = template_version else {
        return false;
    };
    match trim_router_version(raw) {
        Some(version) => compare_versions(&version, minimum) != Ordering::Less,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_router_version() {
        assert_eq!(
            trim_router_version("Cloudstack Release 4.2.1 Mon Jan 1 2024"),
            Some("4.2.1".to_string())
        );
        assert_eq!(trim_router_version("4.10"), Some("4.10".to_string()));
        assert_eq!(trim_router_version("unknown"), None);
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("4.10.0", "4.2.0"), Ordering::Greater);
        assert_eq!(compare_versions("4.2", "4.2.0"), Ordering::Equal);
        assert_eq!(compare_versions("3.0.7", "4.2.0"), Ordering::Less);
    }

    #[test]
    fn test_meets_minimum() {
        assert!(meets_minimum(Some("Cloudstack Release 4.2.0"), "4.2.0"));
        assert!(!meets_minimum(Some("Cloudstack Release 4.1.9"), "4.2.0"));
        assert!(!meets_minimum(None, "4.2.0"));
        assert!(!meets_minimum(Some("garbage"), "4.2.0"));
    }
}
