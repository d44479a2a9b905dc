//! Quality ranking for stream variants
//!
//! Orders variants best-first by a fixed table (1080p > 720p > 480p > rest).
//! Same-rank variants keep the provider's order, which is how mirrors of the
//! same quality stay in preference order.

use crate::api::decrypt::RawVariant;
use crate::models::{Quality, StreamCandidate};

/// Container hint used when the provider doesn't give one
pub const DEFAULT_CONTAINER: &str = "hls";

/// Rank raw variants into candidates, best first.
///
/// Variants without a URL are dropped. Empty input gives empty output; the
/// caller decides what "nothing to play" means.
pub fn rank(variants: Vec<RawVariant>) -> Vec<StreamCandidate> {
    let mut candidates: Vec<StreamCandidate> = variants
        .into_iter()
        .filter_map(into_candidate)
        .collect();

    // sort_by is stable: ties keep input order
    candidates.sort_by(|a, b| b.quality.rank().cmp(&a.quality.rank()));
    candidates
}

fn into_candidate(variant: RawVariant) -> Option<StreamCandidate> {
    let url = variant.url.filter(|u| !u.trim().is_empty())?;
    let container_hint = variant
        .kind
        .filter(|k| !k.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CONTAINER.to_string());

    Some(StreamCandidate {
        url,
        quality: Quality::from_label(variant.quality.as_deref().unwrap_or_default()),
        container_hint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(url: &str, quality: &str) -> RawVariant {
        RawVariant {
            url: Some(url.to_string()),
            quality: Some(quality.to_string()),
            kind: None,
        }
    }

    fn urls(candidates: &[StreamCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.url.as_str()).collect()
    }

    #[test]
    fn test_stable_tie_keeps_provider_order() {
        let ranked = rank(vec![
            variant("A", "720p"),
            variant("B", "1080p"),
            variant("C", "1080p"),
        ]);
        assert_eq!(urls(&ranked), vec!["B", "C", "A"]);
    }

    #[test]
    fn test_unknown_labels_rank_with_360p() {
        let ranked = rank(vec![
            variant("four-k", "4K"),
            variant("low", "360p"),
            variant("sd", "480p"),
            variant("blank", ""),
        ]);
        assert_eq!(urls(&ranked), vec!["sd", "four-k", "low", "blank"]);
    }

    #[test]
    fn test_empty_in_empty_out() {
        assert!(rank(Vec::new()).is_empty());
    }

    #[test]
    fn test_variants_without_url_are_dropped() {
        let ranked = rank(vec![
            RawVariant {
                url: None,
                quality: Some("1080p".into()),
                kind: None,
            },
            variant("  ", "1080p"),
            variant("ok", "480p"),
        ]);
        assert_eq!(urls(&ranked), vec!["ok"]);
    }

    #[test]
    fn test_container_hint_defaults_to_hls() {
        let ranked = rank(vec![
            variant("a", "720p"),
            RawVariant {
                url: Some("b".into()),
                quality: Some("720p".into()),
                kind: Some("mp4".into()),
            },
        ]);
        assert_eq!(ranked[0].container_hint, "hls");
        assert_eq!(ranked[1].container_hint, "mp4");
    }

    #[test]
    fn test_output_sorted_descending_for_mixed_input() {
        let labels = ["360p", "1080p", "weird", "720p", "480p", "1080p", "720p"];
        let input: Vec<RawVariant> = labels
            .iter()
            .enumerate()
            .map(|(i, q)| variant(&i.to_string(), q))
            .collect();
        let ranked = rank(input);

        for pair in ranked.windows(2) {
            assert!(pair[0].quality.rank() >= pair[1].quality.rank());
            if pair[0].quality.rank() == pair[1].quality.rank() {
                let a: usize = pair[0].url.parse().unwrap();
                let b: usize = pair[1].url.parse().unwrap();
                assert!(a < b, "tie order not preserved");
            }
        }
    }
}
