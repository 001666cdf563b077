//! Masking of secrets before they reach the logs.

const DEFAULT_PADDING: usize = 3;

/// Mask `data`, keeping three characters visible on each side.
pub fn mask_sensitive(data: &str) -> String {
    mask_with_padding(data, DEFAULT_PADDING)
}

/// Mask `data`, keeping `padding` characters visible on each side.
///
/// Strings too short to keep both sides are fully masked.
pub fn mask_with_padding(data: &str, padding: usize) -> String {
    let chars: Vec<char> = data.chars().collect();
    if chars.len() <= padding * 2 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..padding].iter().collect();
    let tail: String = chars[chars.len() - padding..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - padding * 2), tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_keeps_edges() {
        assert_eq!(mask_sensitive("sk-1234567890"), "sk-*******890");
    }

    #[test]
    fn test_short_values_fully_masked() {
        assert_eq!(mask_sensitive("abcdef"), "******");
        assert_eq!(mask_sensitive(""), "");
    }

    #[test]
    fn test_multibyte_characters() {
        assert_eq!(mask_with_padding("令牌令牌令牌", 1), "令****牌");
    }
}
