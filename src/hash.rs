// The V1 name hash the TPI hash stream buckets names with. Whole u32
// words of the name are folded in first, then the 2- and 1-byte tail,
// then a case fold and two shifts.

pub fn name_hash_v1(name: &str) -> u32 {
    let bytes = name.as_bytes();
    let mut hash: u32 = 0;

    let mut words = bytes.chunks_exact(4);
    for word in &mut words {
        hash ^= u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
    }
    let mut tail = words.remainder();
    if tail.len() >= 2 {
        hash ^= u16::from_le_bytes([tail[0], tail[1]]) as u32;
        tail = &tail[2..];
    }
    if let Some(&b) = tail.first() {
        hash ^= b as u32;
    }

    hash |= 0x2020_2020;
    hash ^= hash >> 11;
    hash ^ (hash >> 16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_ascii_case() {
        assert_eq!(name_hash_v1("Yolo"), name_hash_v1("yolo"));
        assert_eq!(name_hash_v1("Yolo"), name_hash_v1("YOLO"));
    }

    #[test]
    fn tail_bytes_contribute() {
        // lengths 4, 5, 6, 7 exercise the word, byte, and u16 paths
        let hashes = [
            name_hash_v1("abcd"),
            name_hash_v1("abcde"),
            name_hash_v1("abcdef"),
            name_hash_v1("abcdefg"),
        ];
        for (i, a) in hashes.iter().enumerate() {
            for b in &hashes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn deterministic() {
        assert_eq!(name_hash_v1(""), name_hash_v1(""));
        assert_eq!(name_hash_v1("Yolo"), name_hash_v1("Yolo"));
    }
}
