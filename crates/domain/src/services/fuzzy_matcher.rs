//! Fuzzy matching of noisy device names against known canonical names.

/// Default minimum score for a name to count as a match.
pub const DEFAULT_MATCH_THRESHOLD: u8 = 80;

/// Similarity of two strings on a 0..=100 scale.
pub trait Similarity: Send + Sync {
    fn similarity(&self, a: &str, b: &str) -> u8;
}

/// Case-folded Levenshtein similarity.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevenshteinRatio;

impl Similarity for LevenshteinRatio {
    fn similarity(&self, a: &str, b: &str) -> u8 {
        ratio(&a.to_lowercase(), &b.to_lowercase())
    }
}

/// Levenshtein similarity ignoring all whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpaceInsensitiveRatio;

impl Similarity for SpaceInsensitiveRatio {
    fn similarity(&self, a: &str, b: &str) -> u8 {
        let strip = |s: &str| -> String {
            s.chars()
                .filter(|c| !c.is_whitespace())
                .flat_map(char::to_lowercase)
                .collect()
        };
        ratio(&strip(a), &strip(b))
    }
}

/// Levenshtein similarity of the alphabetically sorted words.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenSortRatio;

impl Similarity for TokenSortRatio {
    fn similarity(&self, a: &str, b: &str) -> u8 {
        let sorted = |s: &str| -> String {
            let lower = s.to_lowercase();
            let mut tokens: Vec<&str> = lower.split_whitespace().collect();
            tokens.sort_unstable();
            tokens.join(" ")
        };
        ratio(&sorted(a), &sorted(b))
    }
}

/// Best of the case-folded, space-insensitive and token-sort ratios.
///
/// Covers the usual OCR noise on device names: dropped or extra spaces,
/// single character substitutions and case flips.
#[derive(Debug, Clone, Copy, Default)]
pub struct OcrTolerantSimilarity;

impl Similarity for OcrTolerantSimilarity {
    fn similarity(&self, a: &str, b: &str) -> u8 {
        LevenshteinRatio
            .similarity(a, b)
            .max(SpaceInsensitiveRatio.similarity(a, b))
            .max(TokenSortRatio.similarity(a, b))
    }
}

/// A known name that matched, with its score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMatch {
    pub name: String,
    pub score: u8,
}

/// Resolves raw names to known canonical names.
#[derive(Debug, Clone)]
pub struct FuzzyDeviceMatcher<S = OcrTolerantSimilarity> {
    scorer: S,
    threshold: u8,
}

impl Default for FuzzyDeviceMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}

impl FuzzyDeviceMatcher {
    pub fn new(threshold: u8) -> Self {
        Self::with_scorer(OcrTolerantSimilarity, threshold)
    }
}

impl<S: Similarity> FuzzyDeviceMatcher<S> {
    pub fn with_scorer(scorer: S, threshold: u8) -> Self {
        Self {
            scorer,
            threshold: threshold.min(100),
        }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Returns the best scoring known name at or above the threshold.
    ///
    /// Equal scores resolve to the lexicographically smaller name, so the
    /// result never depends on iteration order.
    pub fn best_match<'a, I>(&self, raw_name: &str, known_names: I) -> Option<NameMatch>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut best: Option<(&'a str, u8)> = None;
        for candidate in known_names {
            let score = self.scorer.similarity(raw_name, candidate);
            if score < self.threshold {
                continue;
            }
            best = match best {
                Some((name, best_score))
                    if best_score > score || (best_score == score && name <= candidate) =>
                {
                    Some((name, best_score))
                }
                _ => Some((candidate, score)),
            };
        }
        best.map(|(name, score)| NameMatch {
            name: name.to_string(),
            score,
        })
    }
}

/// Scores two strings as `100 * (1 - distance / longest length)`.
fn ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 100;
    }
    let distance = levenshtein(&a, &b);
    let similarity = 100.0 * (1.0 - distance as f64 / longest as f64);
    similarity.round().clamp(0.0, 100.0) as u8
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}
