//! Fuzzy subsequence matching and ranking
//!
//! A query matches an entry when its characters appear in the entry in order,
//! ignoring case. Among matches, tight runs near the start of a short entry
//! win. Ordering is fully deterministic: score descending, then entry name
//! ascending.

use std::ops::Range;

use crate::store::Entry;

/// Score given to every entry when the query is empty
pub const BASELINE_SCORE: i64 = 0;

const SCORE_MATCH: i64 = 16;
const BONUS_CONSECUTIVE: i64 = 24;
const BONUS_SEGMENT_START: i64 = 12;
const PENALTY_LEADING: i64 = 3;
const MAX_LEADING_PENALTY: i64 = 30;
const PENALTY_GAP: i64 = 2;
const LENGTH_DIVISOR: i64 = 4;

/// A ranked entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub entry: Entry,
    pub score: i64,
    /// Matched character runs, as char index ranges into the entry name
    pub highlights: Vec<Range<usize>>,
}

/// Rank `entries` against `query`.
///
/// An empty query returns every entry in the given order with
/// [`BASELINE_SCORE`].
pub fn rank(query: &str, entries: &[Entry]) -> Vec<MatchResult> {
    let needle: Vec<char> = query.chars().collect();

    if needle.is_empty() {
        return entries
            .iter()
            .map(|entry| MatchResult {
                entry: entry.clone(),
                score: BASELINE_SCORE,
                highlights: Vec::new(),
            })
            .collect();
    }

    let mut results: Vec<MatchResult> = entries
        .iter()
        .filter_map(|entry| {
            let (score, positions) = score(&needle, entry.as_str())?;
            Some(MatchResult {
                entry: entry.clone(),
                score,
                highlights: to_ranges(&positions),
            })
        })
        .collect();

    results.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.entry.cmp(&b.entry)));
    results
}

/// Map a score onto a float relevance for launchers that want one.
///
/// Logistic curve centred on half the best score the query can reach, so the
/// result stays strictly inside `(0.0, 1.0)` and strictly increasing in
/// `score` for a fixed query. Launchers that re-sort by relevance therefore
/// keep our order, long low-scoring paths included. The empty query maps to
/// `1.0`.
pub fn relevance(query: &str, score: i64) -> f64 {
    let len = query.chars().count() as i64;
    if len == 0 {
        return 1.0;
    }
    let perfect = (len * SCORE_MATCH + (len - 1) * BONUS_CONSECUTIVE + BONUS_SEGMENT_START) as f64;
    let midpoint = perfect / 2.0;
    let spread = perfect / 8.0;
    1.0 / (1.0 + ((midpoint - score as f64) / spread).exp())
}

/// Score one candidate. `None` if `needle` is not a subsequence.
///
/// Tries every occurrence of the first needle char as an anchor and extends
/// greedily from there, keeping the best-scoring alignment.
pub fn score(needle: &[char], candidate: &str) -> Option<(i64, Vec<usize>)> {
    let haystack: Vec<char> = candidate.chars().collect();
    let first = *needle.first()?;

    let mut best: Option<(i64, Vec<usize>)> = None;
    for anchor in (0..haystack.len()).filter(|&i| eq_fold(haystack[i], first)) {
        let Some(positions) = align_from(needle, &haystack, anchor) else {
            // No later anchor can succeed if this one could not
            break;
        };
        let score = score_alignment(&haystack, &positions);
        if best.as_ref().map_or(true, |(b, _)| score > *b) {
            best = Some((score, positions));
        }
    }
    best
}

/// Greedy leftmost alignment of `needle` starting with `needle[0]` at `anchor`
fn align_from(needle: &[char], haystack: &[char], anchor: usize) -> Option<Vec<usize>> {
    let mut positions = Vec::with_capacity(needle.len());
    positions.push(anchor);
    let mut cursor = anchor + 1;
    for &c in &needle[1..] {
        let offset = haystack[cursor..].iter().position(|&h| eq_fold(h, c))?;
        positions.push(cursor + offset);
        cursor += offset + 1;
    }
    Some(positions)
}

fn score_alignment(haystack: &[char], positions: &[usize]) -> i64 {
    let mut score = positions.len() as i64 * SCORE_MATCH;

    for (i, &pos) in positions.iter().enumerate() {
        if i > 0 && positions[i - 1] + 1 == pos {
            score += BONUS_CONSECUTIVE;
        }
        if is_segment_start(haystack, pos) {
            score += BONUS_SEGMENT_START;
        }
    }

    let first = positions[0] as i64;
    let last = positions[positions.len() - 1] as i64;
    let gaps = (last - first + 1) - positions.len() as i64;

    score -= (first * PENALTY_LEADING).min(MAX_LEADING_PENALTY);
    score -= gaps * PENALTY_GAP;
    score -= haystack.len() as i64 / LENGTH_DIVISOR;
    score
}

fn is_segment_start(haystack: &[char], pos: usize) -> bool {
    pos == 0 || matches!(haystack[pos - 1], '/' | '-' | '_' | '.' | ' ' | '@')
}

fn eq_fold(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

fn to_ranges(positions: &[usize]) -> Vec<Range<usize>> {
    let mut ranges: Vec<Range<usize>> = Vec::new();
    for &pos in positions {
        match ranges.last_mut() {
            Some(last) if last.end == pos => last.end = pos + 1,
            _ => ranges.push(pos..pos + 1),
        }
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(names: &[&str]) -> Vec<Entry> {
        names.iter().map(|n| Entry::from(*n)).collect()
    }

    fn ranked(query: &str, names: &[&str]) -> Vec<String> {
        rank(query, &entries(names))
            .into_iter()
            .map(|m| m.entry.to_string())
            .collect()
    }

    /// Plain ordered-subsequence check used as the reference
    fn is_subsequence(query: &str, target: &str) -> bool {
        let target = target.to_lowercase();
        let mut chars = target.chars();
        query
            .to_lowercase()
            .chars()
            .all(|q| chars.by_ref().any(|t| t == q))
    }

    const GITHUB: [&str; 3] = [
        "github.com/username",
        "work/github-enterprise",
        "personal/github-backup",
    ];

    #[test]
    fn test_all_github_entries_match_gh() {
        let result = ranked("gh", &GITHUB);
        assert_eq!(result.len(), 3);
        assert_eq!(result, ranked("gh", &GITHUB));
        assert_eq!(result[0], "github.com/username");
    }

    #[test]
    fn test_order_independent_of_input_order() {
        let mut reversed = GITHUB;
        reversed.reverse();
        assert_eq!(ranked("gh", &GITHUB), ranked("gh", &reversed));
    }

    #[test]
    fn test_empty_query_lists_everything_in_order() {
        let result = rank("", &entries(&GITHUB));
        assert_eq!(result.len(), 3);
        for (m, name) in result.iter().zip(GITHUB) {
            assert_eq!(m.entry.as_str(), name);
            assert_eq!(m.score, BASELINE_SCORE);
            assert!(m.highlights.is_empty());
        }
    }

    #[test]
    fn test_inclusion_is_exactly_subsequence() {
        let names = [
            "email/gmail",
            "work/aws-console",
            "Social/Mastodon",
            "bank",
            "b/a/n/k",
            "knab",
            "ünïcode/Straße",
            "",
        ];
        let queries = ["", "a", "bank", "BANK", "ak", "ka", "mail", "wc", "sm", "straße", "ÜN", "zzz", "k/"];

        for query in queries {
            let included = ranked(query, &names);
            for name in names {
                assert_eq!(
                    included.iter().any(|n| n == name),
                    is_subsequence(query, name),
                    "query {:?} vs entry {:?}",
                    query,
                    name
                );
            }
        }
    }

    #[test]
    fn test_sorted_by_score_then_name() {
        let names = ["ab", "xab", "a-b", "ba", "aab", "zab", "yab"];
        let result = rank("ab", &entries(&names));
        for pair in result.windows(2) {
            assert!(
                pair[0].score > pair[1].score
                    || (pair[0].score == pair[1].score && pair[0].entry < pair[1].entry)
            );
        }
        // xab / yab / zab score the same and fall back to name order
        let tied: Vec<&str> = result
            .iter()
            .filter(|m| m.entry.as_str().ends_with("ab") && m.entry.as_str().len() == 3)
            .map(|m| m.entry.as_str())
            .filter(|n| *n != "aab")
            .collect();
        assert_eq!(tied, vec!["xab", "yab", "zab"]);
    }

    #[test]
    fn test_contiguous_beats_scattered() {
        assert_eq!(ranked("git", &["gxixt", "git"])[0], "git");
        assert_eq!(ranked("hub", &["h-u-b-x", "xhubxxx"])[0], "xhubxxx");
    }

    #[test]
    fn test_earlier_start_wins() {
        assert_eq!(ranked("mail", &["xxxxmail", "mailxxxx"])[0], "mailxxxx");
    }

    #[test]
    fn test_shorter_entry_wins_when_otherwise_equal() {
        assert_eq!(
            ranked("bank", &["bank/checking-account-long", "bank/pin"])[0],
            "bank/pin"
        );
    }

    #[test]
    fn test_best_alignment_is_chosen() {
        // Greedy from the first 'g' gives a scattered match; the later
        // "gh" run must win.
        let (_, positions) = score(&['g', 'h'], "gxxxxxx/gh").unwrap();
        assert_eq!(positions, vec![8, 9]);
    }

    #[test]
    fn test_case_insensitive_and_case_preserving() {
        let result = rank("vpn", &entries(&["Work/VPN"]));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].entry.as_str(), "Work/VPN");
        assert_eq!(result[0].highlights, vec![5..8]);
    }

    #[test]
    fn test_highlight_ranges() {
        let result = rank("gite", &entries(&["work/github-enterprise"]));
        assert_eq!(result[0].highlights, vec![5..8, 12..13]);
    }

    #[test]
    fn test_relevance_bounds() {
        assert_eq!(relevance("", BASELINE_SCORE), 1.0);
        let exact = rank("bank", &entries(&["bank"]));
        let r = relevance("bank", exact[0].score);
        assert!(r > 0.8 && r < 1.0);
        assert!(relevance("bank", -50) > 0.0);

        let loose = rank("bk", &entries(&["bxxxxxxxxxxxxxk"]));
        assert!(relevance("bk", loose[0].score) < r);
    }

    #[test]
    fn test_relevance_keeps_rank_order_for_deep_paths() {
        let matches = rank(
            "gh",
            &entries(&[
                "archive/2019/old-accounts/personal/github",
                "archive/2015/legacy-migrations/old-accounts/personal/github-enterprise-mirror",
                "work/github",
                "gitlab/hosting/backup-keys",
            ]),
        );
        assert_eq!(matches.len(), 4);

        let scores: Vec<i64> = matches.iter().map(|m| m.score).collect();
        assert!(scores.iter().filter(|&&s| s <= 0).count() >= 2, "{:?}", scores);

        let rel: Vec<f64> = matches.iter().map(|m| relevance("gh", m.score)).collect();
        for pair in rel.windows(2) {
            assert!(pair[0] > pair[1], "{:?}", rel);
        }
        assert!(rel.iter().all(|&r| r > 0.0 && r < 1.0), "{:?}", rel);
    }

    #[test]
    fn test_relevance_strictly_increasing() {
        let mut previous = relevance("gh", -200);
        for score in -199..=68 {
            let r = relevance("gh", score);
            assert!(r > previous, "score {} gave {} after {}", score, r, previous);
            previous = r;
        }
    }
}
