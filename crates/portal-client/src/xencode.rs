//! The XXTEA-style block cipher used by the SRUN portal's `info` field.

const DELTA: u32 = 0x9E37_79B9;

/// Pack bytes into little-endian words, zero-padding the last one.
fn to_words(data: &[u8], append_len: bool) -> Vec<u32> {
    let mut words: Vec<u32> = data
        .chunks(4)
        .map(|chunk| {
            let mut buf = [0u8; 4];
            buf[..chunk.len()].copy_from_slice(chunk);
            u32::from_le_bytes(buf)
        })
        .collect();
    if append_len {
        words.push(data.len() as u32);
    }
    words
}

fn mix(z: u32, y: u32, sum: u32, key: u32) -> u32 {
    ((z >> 5) ^ (y << 2))
        .wrapping_add((y >> 3) ^ (z << 4) ^ (sum ^ y))
        .wrapping_add(key ^ z)
}

/// Encrypt `data` with `key`.
///
/// The plaintext length is appended as an extra word before encryption and
/// the full word array is returned, so the output is always a multiple of
/// four bytes and four bytes longer than the padded input.
pub(crate) fn xencode(data: &[u8], key: &[u8]) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }

    let mut v = to_words(data, true);
    let mut k = to_words(key, false);
    if k.len() < 4 {
        k.resize(4, 0);
    }

    let n = v.len() - 1;
    let mut z = v[n];
    let mut sum: u32 = 0;
    let rounds = 6 + 52 / (n + 1);

    for _ in 0..rounds {
        sum = sum.wrapping_add(DELTA);
        let e = ((sum >> 2) & 3) as usize;
        for p in 0..n {
            let y = v[p + 1];
            v[p] = v[p].wrapping_add(mix(z, y, sum, k[(p & 3) ^ e]));
            z = v[p];
        }
        let y = v[0];
        v[n] = v[n].wrapping_add(mix(z, y, sum, k[(n & 3) ^ e]));
        z = v[n];
    }

    v.iter().flat_map(|word| word.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_encodes_to_nothing() {
        assert!(xencode(b"", b"key").is_empty());
    }

    #[test]
    fn words_are_little_endian_and_padded() {
        assert_eq!(to_words(b"abcde", false), vec![0x6463_6261, 0x65]);
        assert_eq!(to_words(b"abcde", true), vec![0x6463_6261, 0x65, 5]);
    }

    #[test]
    fn output_is_word_aligned_with_length_word() {
        let out = xencode(b"hello", b"challenge");
        // two data words plus the length word
        assert_eq!(out.len(), 12);
    }

    #[test]
    fn deterministic_for_same_inputs() {
        let a = xencode(br#"{"username":"alice"}"#, b"abc123");
        let b = xencode(br#"{"username":"alice"}"#, b"abc123");
        assert_eq!(a, b);
    }

    #[test]
    fn key_changes_ciphertext() {
        let a = xencode(b"payload", b"abc123");
        let b = xencode(b"payload", b"abc124");
        assert_ne!(a, b);
    }

    #[test]
    fn short_key_is_zero_extended() {
        // a key shorter than four words behaves like the zero-padded key
        let short = xencode(b"payload", b"k");
        let padded = xencode(b"payload", b"k\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0");
        assert_eq!(short, padded);
    }
}
