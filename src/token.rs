use rand::distributions::Alphanumeric;
use rand::{
    thread_rng,
    Rng,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token length must be at least 2")]
    Length,
}

/// Randomly generates keys for new content uploads.
///
/// Keys are drawn uniformly from the 62 characters `[a-zA-Z0-9]` using the
/// thread-local CSPRNG. The generator performs no uniqueness check; a
/// colliding key is caught by the store's exclusive create.
pub struct TokenGenerator {
    length: usize,
}

impl TokenGenerator {
    pub fn new(length: usize) -> Result<TokenGenerator, TokenError> {
        if length < 2 {
            return Err(TokenError::Length);
        }
        Ok(TokenGenerator {
            length: length,
        })
    }

    pub fn generate(&self) -> String {
        thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect()
    }
}

/// Whether a request path names a key that could ever have been generated.
pub fn is_valid(token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    token.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::{
        is_valid,
        TokenGenerator,
    };

    #[test]
    fn test_shape() {
        let g = TokenGenerator::new(7).unwrap();
        for _ in 0..64 {
            let token = g.generate();
            assert_eq!(token.len(), 7);
            assert!(is_valid(&token));
        }
    }

    #[test]
    fn test_too_short() {
        assert!(TokenGenerator::new(1).is_err());
        assert!(TokenGenerator::new(0).is_err());
        assert!(TokenGenerator::new(2).is_ok());
    }

    #[test]
    fn test_validity() {
        assert!(is_valid("aB3xY9z"));
        assert!(!is_valid(""));
        assert!(!is_valid("abc.def"));
        assert!(!is_valid("abc/def"));
        assert!(!is_valid("abc$"));
    }
}
