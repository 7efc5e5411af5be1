//! Prioritizes and truncates suggestion lists

/// Ranks one facet's suggestions: remote-sourced first, then local heuristics,
/// exact duplicates and blanks removed, truncated to the cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestionRanker {
    cap: usize,
}

impl SuggestionRanker {
    pub fn new(cap: usize) -> Self {
        Self { cap }
    }

    pub fn rank<R, L>(&self, remote: R, local: L) -> Vec<String>
    where
        R: IntoIterator<Item = String>,
        L: IntoIterator<Item = String>,
    {
        dedup_capped(remote.into_iter().chain(local), self.cap)
    }

    /// Pool several already-ranked lists in the order given, dedup and cap
    pub fn pool<'a, I>(lists: I, cap: usize) -> Vec<String>
    where
        I: IntoIterator<Item = &'a [String]>,
    {
        dedup_capped(lists.into_iter().flatten().cloned(), cap)
    }
}

fn dedup_capped(items: impl Iterator<Item = String>, cap: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if out.len() >= cap {
            break;
        }
        if item.trim().is_empty() || out.contains(&item) {
            continue;
        }
        out.push(item);
    }
    out
}
