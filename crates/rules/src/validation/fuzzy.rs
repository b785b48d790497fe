//! Closest-name hints for misspelled technologies, vendors and templates.

/// The candidate nearest to `input`, ignoring case. Ties keep the earlier
/// candidate; anything further than half the longer name is no hint.
pub(crate) fn fuzzy_match<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    let needle = input.to_lowercase();
    let (name, distance) = candidates
        .iter()
        .enumerate()
        .map(|(idx, &name)| (idx, name, levenshtein(&needle, &name.to_lowercase())))
        .min_by_key(|&(idx, _, distance)| (distance, idx))
        .map(|(_, name, distance)| (name, distance))?;
    (distance <= input.len().max(name.len()) / 2).then_some(name)
}

/// Edit distance, one row at a time.
pub(crate) fn levenshtein(a: &str, b: &str) -> usize {
    let target: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=target.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, &cb) in target.iter().enumerate() {
            let substitution = diagonal + usize::from(ca != cb);
            diagonal = row[j + 1];
            row[j + 1] = substitution.min(row[j] + 1).min(diagonal + 1);
        }
    }
    row[target.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANGUAGES: &[&str] = &["java", "dotnetcore", "nodejs", "apache", "nginx"];

    #[test]
    fn distances() {
        assert_eq!(levenshtein("appd", "apd"), 1);
        assert_eq!(levenshtein("", "otel"), 4);
        assert_eq!(levenshtein("nginx", "nginx"), 0);
        assert_eq!(levenshtein("telescop", "telescope"), 1);
    }

    #[test]
    fn hints_close_names() {
        assert_eq!(fuzzy_match("jav", LANGUAGES), Some("java"));
        assert_eq!(fuzzy_match("NodeJS", LANGUAGES), Some("nodejs"));
        assert_eq!(fuzzy_match("dotnet-core", LANGUAGES), Some("dotnetcore"));
    }

    #[test]
    fn no_hint_for_unrelated_names() {
        assert_eq!(fuzzy_match("ruby", LANGUAGES), None);
        assert_eq!(fuzzy_match("ruby", &[]), None);
    }
}
