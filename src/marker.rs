//! Locate frame markers inside a block of bytes.
//!
//! Every frame of a CSQ stream is an FFF record, and so
//! begins with the FFF signature followed by `RT`.
use aho_corasick::AhoCorasick;
use lazy_static::lazy_static;

/// Byte sequence that starts every frame.
pub const MARKER: &[u8; 6] = b"FFF\0RT";
pub const MARKER_LEN: usize = MARKER.len();

lazy_static! {
    static ref SCANNER: AhoCorasick = AhoCorasick::new([&MARKER[..]]).unwrap();
}

/// Offsets of every marker in `block`, ascending and
/// non-overlapping. An empty result only means the block
/// holds no frame boundary.
pub fn find_markers(block: &[u8]) -> Vec<usize> {
    SCANNER.find_iter(block).map(|m| m.start()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn marker_bytes() {
        assert_eq!(MARKER, &[0x46, 0x46, 0x46, 0x00, 0x52, 0x54]);
    }

    #[rstest]
    #[case(b"", vec![])]
    #[case(b"no boundary in here", vec![])]
    #[case(b"FFF\0RT", vec![0])]
    #[case(b"xxFFF\0RTyyFFF\0RT", vec![2, 10])]
    #[case(b"FFF\0RTFFF\0RT", vec![0, 6])]
    #[case(b"FFF\0R", vec![])]
    #[case(b"FFFF\0RT", vec![1])]
    fn finds_markers(#[case] block: &[u8], #[case] expected: Vec<usize>) {
        assert_eq!(find_markers(block), expected);
    }
}
