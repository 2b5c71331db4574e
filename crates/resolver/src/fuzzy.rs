use nucleo_matcher::{pattern::Pattern, Matcher};

/// Fuzzy ranking of option descriptions against typed text
pub struct DescriptionMatcher {
    matcher: Matcher,
}

impl DescriptionMatcher {
    pub fn new() -> Self {
        Self {
            matcher: Matcher::new(nucleo_matcher::Config::DEFAULT),
        }
    }

    /// Rank `candidates` against `query`.
    /// Returns (candidate_index, score) sorted by score descending; a blank
    /// query keeps the original order.
    pub fn rank(&mut self, query: &str, candidates: &[&str], limit: usize) -> Vec<(usize, f32)> {
        if query.trim().is_empty() {
            return (0..candidates.len().min(limit)).map(|idx| (idx, 1.0)).collect();
        }

        let pattern = Pattern::parse(
            query,
            nucleo_matcher::pattern::CaseMatching::Ignore,
            nucleo_matcher::pattern::Normalization::Smart,
        );

        let mut scored: Vec<(usize, u32)> = candidates
            .iter()
            .enumerate()
            .filter_map(|(idx, candidate)| {
                let haystack = nucleo_matcher::Utf32String::from(*candidate);
                pattern
                    .score(haystack.slice(..), &mut self.matcher)
                    .map(|score| (idx, score))
            })
            .collect();

        // Stable on ties so equal scores keep list order
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.truncate(limit);

        let max_score = scored.first().map(|(_, s)| *s as f32).unwrap_or(1.0);

        scored
            .into_iter()
            .map(|(idx, score)| {
                let normalized = if max_score > 0.0 {
                    score as f32 / max_score
                } else {
                    0.0
                };
                (idx, normalized)
            })
            .collect()
    }
}

impl Default for DescriptionMatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_match_ranks_first() {
        let mut matcher = DescriptionMatcher::new();
        let candidates = ["Córdoba", "Buenos Aires", "Catamarca"];
        let results = matcher.rank("bue", &candidates, 5);
        assert_eq!(results[0].0, 1);
    }

    #[test]
    fn accents_are_normalized() {
        let mut matcher = DescriptionMatcher::new();
        let candidates = ["Sección Capital", "Sección Norte"];
        let results = matcher.rank("seccion cap", &candidates, 5);
        assert!(!results.is_empty());
        assert_eq!(results[0].0, 0);
    }

    #[test]
    fn blank_query_keeps_order_up_to_limit() {
        let mut matcher = DescriptionMatcher::new();
        let candidates = ["a", "b", "c"];
        let results = matcher.rank("  ", &candidates, 2);
        assert_eq!(results, vec![(0, 1.0), (1, 1.0)]);
    }

    #[test]
    fn unmatched_query_returns_nothing() {
        let mut matcher = DescriptionMatcher::new();
        let results = matcher.rank("zzz", &["Mendoza", "Salta"], 5);
        assert!(results.is_empty());
    }
}
