//! Token generation.
//!
//! Prints a random alphanumeric string suitable for `ADMIN_API_TOKEN`. The
//! storefront rejects tokens shorter than 32 characters.

use rand::Rng;
use rand::distr::Alphanumeric;

/// Default token length.
pub const DEFAULT_LENGTH: usize = 48;

/// Shortest token the storefront accepts.
const MIN_LENGTH: usize = 32;

/// Build a random alphanumeric token.
fn random_token<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}

/// Print a new token.
///
/// # Errors
///
/// Returns error if `length` is below the storefront minimum.
pub fn generate(length: usize) -> Result<(), Box<dyn std::error::Error>> {
    if length < MIN_LENGTH {
        return Err(format!("token length must be at least {MIN_LENGTH}").into());
    }

    let token = random_token(&mut rand::rng(), length);

    #[allow(clippy::print_stdout)]
    {
        println!("{token}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_token_shape() {
        let token = random_token(&mut rand::rng(), DEFAULT_LENGTH);
        assert_eq!(token.len(), DEFAULT_LENGTH);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_random_tokens_differ() {
        let mut rng = rand::rng();
        assert_ne!(random_token(&mut rng, 40), random_token(&mut rng, 40));
    }

    #[test]
    fn test_rejects_short_length() {
        assert!(generate(MIN_LENGTH - 1).is_err());
    }
}
