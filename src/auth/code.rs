use rand::{rngs::OsRng, Rng};

/// One-time verification code: exactly 6 ASCII digits drawn uniformly from
/// [100000, 999999] with the OS CSPRNG. The zero-padding is vacuous given the
/// range floor but kept as part of the output contract.
pub fn generate_code() -> String {
    format!("{:06}", OsRng.gen_range(100_000..=999_999))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_six_ascii_digits_in_range() {
        for _ in 0..1000 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            let n: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&n));
        }
    }

    #[test]
    fn codes_vary_between_draws() {
        let codes: std::collections::HashSet<String> = (0..100).map(|_| generate_code()).collect();
        // 100 draws from 900k values colliding down to one would mean a
        // broken generator.
        assert!(codes.len() > 1);
    }
}
