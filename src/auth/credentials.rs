use rand::Rng;

/// Six-digit numeric one-time code.
pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(100000..=999999).to_string()
}

/// Compare a submitted code against the stored one. Surrounding whitespace is ignored.
pub fn otp_matches(stored: Option<&str>, submitted: &str) -> bool {
    let submitted = submitted.trim();
    match stored {
        Some(code) if !submitted.is_empty() => {
            let (a, b) = (code.as_bytes(), submitted.as_bytes());
            a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
        }
        _ => false,
    }
}

/// bcrypt hash for storage.
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}
