/// Domains treated as high-trust when scoring evidence sources.
const HIGH_TRUST_DOMAINS: &[&str] = &[
    "who.int",
    "cdc.gov",
    "reuters.com",
    "apnews.com",
    "bbc.com",
    "nytimes.com",
    "theguardian.com",
    "bloomberg.com",
];

/// Quality assigned when a verdict was produced with no evidence at all.
pub const EMPTY_EVIDENCE_QUALITY: f64 = 0.3;

/// Score evidence sources by domain reputation: known high-trust domains
/// 0.9, other `.gov`/`.edu` domains 0.85, everything else 0.5. Returns the
/// mean over all sources, clamped to at most 1.0. Sources may be URLs or
/// bare titles — unrecognized strings score as 0.5.
pub fn source_quality(sources: &[String]) -> f64 {
    if sources.is_empty() {
        return EMPTY_EVIDENCE_QUALITY;
    }

    let total: f64 = sources
        .iter()
        .map(|source| {
            let lower = source.to_lowercase();
            if HIGH_TRUST_DOMAINS.iter().any(|d| lower.contains(d)) {
                0.9
            } else if lower.contains(".gov") || lower.contains(".edu") {
                0.85
            } else {
                0.5
            }
        })
        .sum();

    (total / sources.len() as f64).min(1.0)
}
