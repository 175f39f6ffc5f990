use rand::distributions::{Distribution, Uniform};
use rand::Rng;

pub const CODE_LEN: usize = 8;
pub const MAX_BATCH: usize = 500;

// No 0/O or 1/I: codes are read off printed vouchers.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Uppercases and trims user input so `" ab12cd34 "` matches `AB12CD34`.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

pub fn random_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let pick = Uniform::from(0..ALPHABET.len());
    (0..CODE_LEN)
        .map(|_| ALPHABET[pick.sample(rng)] as char)
        .collect()
}

/// `count` distinct random codes.
pub fn random_codes(count: usize) -> Vec<String> {
    let mut rng = rand::thread_rng();
    let mut codes: Vec<String> = Vec::with_capacity(count);
    while codes.len() < count {
        let code = random_code(&mut rng);
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    codes
}
