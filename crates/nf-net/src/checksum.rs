//! RFC 1624 incremental checksum update: rather than recomputing a header
//! checksum from scratch after rewriting a field, fold the one's-complement
//! difference between the old and new field value into the existing
//! checksum. Used for both a rewritten IPv4 address and a rewritten
//! TCP/UDP port — both update the same IPv4 header checksum.

/// Add a 16-bit word to a one's-complement running sum, folding carries.
#[inline]
fn add16(sum: u32, word: u16) -> u32 {
    let mut s = sum + word as u32;
    while s >> 16 != 0 {
        s = (s & 0xffff) + (s >> 16);
    }
    s
}

/// Subtract a 16-bit word from a one's-complement running sum (RFC 1624
/// calls this adding its complement), folding borrows the same way.
#[inline]
fn sub16(sum: u32, word: u16) -> u32 {
    add16(sum, !word)
}

/// RFC 1624 `HC' = ~(~HC + ~m + m')`: update a stored one's-complement
/// checksum `checksum` in place for an old/new pair of 16-bit words.
fn update_words(checksum: u16, old: &[u16], new: &[u16]) -> u16 {
    debug_assert_eq!(old.len(), new.len());
    let mut sum = !checksum as u32;
    for &w in old {
        sum = sub16(sum, w);
    }
    for &w in new {
        sum = add16(sum, w);
    }
    !(sum as u16)
}

fn u32_to_words(v: u32) -> [u16; 2] {
    [(v >> 16) as u16, v as u16]
}

/// Update `checksum` in place for a 4-byte field (an IPv4 address)
/// changing from `old` to `new`.
pub fn update_for_u32_field(checksum: u16, old: u32, new: u32) -> u16 {
    if old == new {
        return checksum;
    }
    update_words(checksum, &u32_to_words(old), &u32_to_words(new))
}

/// Update `checksum` in place for a 2-byte field (a TCP/UDP port)
/// changing from `old` to `new`.
pub fn update_for_u16_field(checksum: u16, old: u16, new: u16) -> u16 {
    if old == new {
        return checksum;
    }
    update_words(checksum, &[old], &[new])
}

/// Full one's-complement checksum over `data`, for initial computation
/// (tests and any header nf-net itself synthesizes).
pub fn compute(data: &[u8]) -> u16 {
    let mut sum = 0u32;
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum = add16(sum, u16::from_be_bytes([chunk[0], chunk[1]]));
    }
    if let [last] = chunks.remainder() {
        sum = add16(sum, u16::from_be_bytes([*last, 0]));
    }
    !(sum as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incremental_update_matches_full_recompute() {
        // A tiny fake IPv4 header's-worth of words, checksum field zeroed.
        let mut words = [0x4500u16, 0x0028, 0x1c46, 0x4000, 0x4006, 0x0000, 0xc0a8, 0x0001, 0x0808, 0x0808];
        let checksum = compute_from_words(&words);

        // Rewrite the destination address (the last two words) and check
        // the incremental update against a full recompute.
        let old_dst = ((words[8] as u32) << 16) | words[9] as u32;
        let new_dst = 0x0a00_0001u32;
        let incremental = update_for_u32_field(checksum, old_dst, new_dst);

        words[8] = (new_dst >> 16) as u16;
        words[9] = new_dst as u16;
        let recomputed = compute_from_words(&words);
        assert_eq!(incremental, recomputed);
    }

    #[test]
    fn port_update_matches_full_recompute() {
        let words = [0x1234u16, 0x5678, 0x0000, 0x0000];
        let checksum = compute_from_words(&words);

        let updated = update_for_u16_field(checksum, words[1], 0x9abc);
        let mut after = words;
        after[1] = 0x9abc;
        assert_eq!(updated, compute_from_words(&after));
    }

    #[test]
    fn no_op_update_is_identity() {
        assert_eq!(update_for_u32_field(0x1234, 0xc0a80001, 0xc0a80001), 0x1234);
        assert_eq!(update_for_u16_field(0x1234, 80, 80), 0x1234);
    }

    fn compute_from_words(words: &[u16]) -> u16 {
        let mut bytes = Vec::with_capacity(words.len() * 2);
        for w in words {
            bytes.extend_from_slice(&w.to_be_bytes());
        }
        compute(&bytes)
    }
}
