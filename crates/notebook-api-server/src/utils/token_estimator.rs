/// Rough token count for budgeting prompt context.
///
/// Word-based: ~1.3 tokens per whitespace-separated word plus a small
/// formatting overhead. Empty text costs nothing.
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    if words == 0 {
        return 0;
    }
    ((words as f64 * 1.3) + 5.0).ceil() as usize
}
