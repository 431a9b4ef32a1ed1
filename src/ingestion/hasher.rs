//! Cheap deterministic fingerprint used to drop duplicate chunks within a file.

/// Fingerprint `text` with a 32-bit polynomial rolling hash (`h = h * 31 + c`).
///
/// Character codes are UTF-16 code units and the accumulator wraps in signed 32-bit space, so
/// the decimal output (sign included) is stable across runs and platforms. This is not a
/// cryptographic digest; equal text always hashes equally, distinct text may collide.
pub fn content_hash(text: &str) -> String {
    text.encode_utf16()
        .fold(0_i32, |hash, unit| {
            hash.wrapping_mul(31).wrapping_add(i32::from(unit))
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::content_hash;
    use proptest::prelude::*;

    #[test]
    fn empty_text_hashes_to_zero() {
        assert_eq!(content_hash(""), "0");
    }

    #[test]
    fn matches_known_values() {
        assert_eq!(content_hash("a"), "97");
        assert_eq!(content_hash("ab"), "3105");
        assert_eq!(content_hash("hello"), "99162322");
    }

    #[test]
    fn wraps_into_negative_range() {
        let hash = content_hash("Hello World, this sentence overflows thirty-two bits.");
        assert!(hash.parse::<i32>().is_ok());
        assert_eq!(content_hash("polygenelubricants"), "-2147483648");
    }

    #[test]
    fn hashes_astral_characters_as_surrogate_pairs() {
        // U+1F600 encodes as 0xD83D 0xDE00.
        let expected = (0xD83D_i32 * 31 + 0xDE00).to_string();
        assert_eq!(content_hash("\u{1F600}"), expected);
    }

    proptest! {
        #[test]
        fn same_text_same_hash(text in "\\PC{0,200}") {
            prop_assert_eq!(content_hash(&text), content_hash(&text.clone()));
        }
    }
}
