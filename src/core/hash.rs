/*!
 * Hash Primitives
 * Integer and byte-sequence hash functions plus prime bucket sizing
 */

/// Primes used for bucket counts, roughly 1.2x apart
const PRIMES: [u32; 72] = [
    0x3, 0x7, 0xb, 0x11, 0x17, 0x1d, 0x25, 0x2f, 0x3b, 0x47, 0x59, 0x6b, 0x83, 0xa3, 0xc5, 0xef,
    0x125, 0x161, 0x1af, 0x209, 0x277, 0x2f9, 0x397, 0x44f, 0x52f, 0x63d, 0x78b, 0x91d, 0xaf1,
    0xd2b, 0xfd1, 0x12fd, 0x16cf, 0x1b65, 0x20e3, 0x2777, 0x2f6f, 0x38ff, 0x446f, 0x521f, 0x628d,
    0x7655, 0x8e01, 0xaa6b, 0xcc89, 0xf583, 0x126a7, 0x1619b, 0x1a857, 0x1fd3b, 0x26315, 0x2dd67,
    0x3701b, 0x42023, 0x4f361, 0x5f0ed, 0x72125, 0x88e31, 0xa443b, 0xc51eb, 0xec8c1, 0x11bdbf,
    0x154a3f, 0x198c4f, 0x1ea867, 0x24ca19, 0x2c25c1, 0x34fa1b, 0x3f928f, 0x4c4987, 0x5b8b6f,
    0x6dda89,
];

/// Smallest prime >= `minimum`
///
/// Uses the table for common sizes and trial division beyond it.
pub fn prime_at_least(minimum: u32) -> u32 {
    if let Some(&p) = PRIMES.iter().find(|&&p| p >= minimum) {
        return p;
    }

    let mut candidate = minimum | 1;
    while candidate < u32::MAX {
        if is_prime(candidate) {
            return candidate;
        }
        candidate += 2;
    }

    minimum
}

fn is_prime(n: u32) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3u64;
    let n64 = n as u64;
    while d * d <= n64 {
        if n64 % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

/// Java-style 32-bit integer mix
#[inline]
pub fn hash_int32(mut value: u32) -> u32 {
    value ^= (value >> 20) ^ (value >> 12);
    value ^ (value >> 7) ^ (value >> 4)
}

/// Thomas Wang's 64-bit to 32-bit integer hash
#[inline]
pub fn hash_int64(mut value: u64) -> u32 {
    value = (!value).wrapping_add(value << 18);
    value ^= value >> 31;
    value = value.wrapping_mul(21);
    value ^= value >> 11;
    value = value.wrapping_add(value << 6);
    value ^= value >> 22;
    value as u32
}

/// Pointer-width integer hash
#[inline]
pub fn hash_int_ptr(value: usize) -> u32 {
    #[cfg(target_pointer_width = "64")]
    {
        hash_int64(value as u64)
    }
    #[cfg(not(target_pointer_width = "64"))]
    {
        hash_int32(value as u32)
    }
}

/// MurmurHash2 over a byte slice, seeded with the length
pub fn hash_bytes_murmur(bytes: &[u8]) -> u32 {
    const MAGIC: u32 = 0x5bd1_e995;
    const SHIFT: u32 = 24;

    let mut hash = bytes.len() as u32;
    let mut chunks = bytes.chunks_exact(4);

    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(MAGIC);
        k ^= k >> SHIFT;
        k = k.wrapping_mul(MAGIC);

        hash = hash.wrapping_mul(MAGIC);
        hash ^= k;
    }

    let tail = chunks.remainder();
    if tail.len() >= 3 {
        hash ^= (tail[2] as u32) << 16;
    }
    if tail.len() >= 2 {
        hash ^= (tail[1] as u32) << 8;
    }
    if !tail.is_empty() {
        hash ^= tail[0] as u32;
        hash = hash.wrapping_mul(MAGIC);
    }

    hash ^= hash >> 13;
    hash = hash.wrapping_mul(MAGIC);
    hash ^= hash >> 15;
    hash
}

/// Paul Hsieh's SuperFastHash
pub fn hash_bytes_hsieh(bytes: &[u8]) -> u32 {
    if bytes.is_empty() {
        return 0;
    }

    let read16 = |b: &[u8]| u16::from_le_bytes([b[0], b[1]]) as u32;
    let mut hash = bytes.len() as u32;
    let mut chunks = bytes.chunks_exact(4);

    for chunk in &mut chunks {
        hash = hash.wrapping_add(read16(&chunk[0..2]));
        let tmp = (read16(&chunk[2..4]) << 11) ^ hash;
        hash = (hash << 16) ^ tmp;
        hash = hash.wrapping_add(hash >> 11);
    }

    let tail = chunks.remainder();
    match tail.len() {
        3 => {
            hash = hash.wrapping_add(read16(tail));
            hash ^= hash << 16;
            hash ^= (tail[2] as u32) << 18;
            hash = hash.wrapping_add(hash >> 11);
        }
        2 => {
            hash = hash.wrapping_add(read16(tail));
            hash ^= hash << 11;
            hash = hash.wrapping_add(hash >> 17);
        }
        1 => {
            hash = hash.wrapping_add(tail[0] as u32);
            hash ^= hash << 10;
            hash = hash.wrapping_add(hash >> 1);
        }
        _ => {}
    }

    hash ^= hash << 3;
    hash = hash.wrapping_add(hash >> 5);
    hash ^= hash << 4;
    hash = hash.wrapping_add(hash >> 17);
    hash ^= hash << 25;
    hash = hash.wrapping_add(hash >> 6);
    hash
}

/// sdbm hash, seeded with the length
pub fn hash_bytes_sdbm(bytes: &[u8]) -> u32 {
    bytes.iter().fold(bytes.len() as u32, |hash, &b| {
        (b as u32)
            .wrapping_add(hash << 6)
            .wrapping_add(hash << 16)
            .wrapping_sub(hash)
    })
}
