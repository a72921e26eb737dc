/// Build the ordered list of search phrases for a base query.
///
/// Biased variants come first (they steer the provider toward canonical
/// studio releases); the unmodified phrase always comes last so at least one
/// unbiased attempt is made. The result is deduplicated and never empty.
pub fn query_variants(base: &str) -> Vec<String> {
    let q = base.trim();
    let mut variants = Vec::new();
    if !q.to_lowercase().contains("official") {
        variants.push(format!("{q} official audio"));
    }
    variants.push(q.to_string());
    variants
}
