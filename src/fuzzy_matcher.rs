use fuzzy_matcher::FuzzyMatcher;

/// Match score for one candidate; higher is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    pub score: i64,
}

/// Case-insensitive ranked matcher: substring, then prefix, then skim-style fuzzy.
pub struct FzfMatcher {
    matcher: fuzzy_matcher::skim::SkimMatcherV2,
}

impl FzfMatcher {
    pub fn new() -> Self {
        Self {
            matcher: fuzzy_matcher::skim::SkimMatcherV2::default().ignore_case(),
        }
    }

    pub fn fuzzy_match(&self, pattern: &str, text: &str) -> Option<MatchResult> {
        self.matcher
            .fuzzy_match(text, pattern)
            .map(|score| MatchResult { score })
    }

    /// Prefix match; ranks above plain substring hits.
    pub fn prefix_match(&self, pattern: &str, text: &str) -> Option<MatchResult> {
        if text.to_lowercase().starts_with(&pattern.to_lowercase()) {
            Some(MatchResult {
                score: 1200 + (pattern.len() * 10) as i64,
            })
        } else {
            None
        }
    }

    pub fn exact_match(&self, pattern: &str, text: &str) -> Option<MatchResult> {
        if text.to_lowercase().contains(&pattern.to_lowercase()) {
            Some(MatchResult {
                score: 1000 + (pattern.len() * 10) as i64,
            })
        } else {
            None
        }
    }

    /// Tries each strategy by priority on a single text.
    pub fn comprehensive_match(&self, pattern: &str, text: &str) -> Option<MatchResult> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Some(MatchResult { score: 0 });
        }

        self.prefix_match(pattern, text)
            .or_else(|| self.exact_match(pattern, text))
            .or_else(|| self.fuzzy_match(pattern, text))
    }

    /// Best score across several fields. Earlier fields weigh more.
    pub fn best_match(&self, pattern: &str, fields: &[&str]) -> Option<MatchResult> {
        fields
            .iter()
            .enumerate()
            .filter_map(|(rank, field)| {
                self.comprehensive_match(pattern, field).map(|m| MatchResult {
                    score: m.score - (rank as i64) * 50,
                })
            })
            .max_by_key(|m| m.score)
    }

    /// Keeps matching items, highest score first, then shorter key first.
    pub fn match_and_sort<T, F>(&self, pattern: &str, items: Vec<T>, fields: F) -> Vec<(T, MatchResult)>
    where
        F: Fn(&T) -> Vec<String>,
    {
        let mut results: Vec<(T, MatchResult, usize)> = items
            .into_iter()
            .filter_map(|item| {
                let texts = fields(&item);
                let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
                let key_len = refs.first().map(|s| s.len()).unwrap_or(0);
                self.best_match(pattern, &refs).map(|m| (item, m, key_len))
            })
            .collect();

        results.sort_by(|a, b| b.1.score.cmp(&a.1.score).then(a.2.cmp(&b.2)));
        results.into_iter().map(|(item, m, _)| (item, m)).collect()
    }
}

impl Default for FzfMatcher {
    fn default() -> Self {
        Self::new()
    }
}
