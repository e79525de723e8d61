use rand::Rng;

use crate::error::{ClientError, ClientResult};

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
pub const MIN_PASSWORD_LEN: usize = 6;

/// One-off password handed to a newly created employee: eight base-36
/// characters, then `!`, a digit and `A` so common strength rules pass.
pub fn temporary_password() -> String {
    let mut rng = rand::thread_rng();
    let mut password: String = (0..8)
        .map(|_| char::from(BASE36[rng.gen_range(0..BASE36.len())]))
        .collect();
    password.push('!');
    password.push(char::from(b'0' + rng.gen_range(0..10u8)));
    password.push('A');
    password
}

/// Checks applied before setting a password from a recovery or invite link.
pub fn validate_reset(password: &str, confirmation: &str) -> ClientResult<()> {
    if password != confirmation {
        return Err(ClientError::validation("Passwords do not match"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ClientError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Checks applied when a signed-in user changes their password.
pub fn validate_change(new_password: &str, confirmation: &str) -> ClientResult<()> {
    if new_password != confirmation {
        return Err(ClientError::validation("New passwords do not match"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temporary_password_has_expected_shape() {
        for _ in 0..32 {
            let password = temporary_password();
            assert_eq!(password.len(), 11);
            let (random, suffix) = password.split_at(8);
            assert!(random
                .bytes()
                .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()));
            let suffix: Vec<char> = suffix.chars().collect();
            assert_eq!(suffix[0], '!');
            assert!(suffix[1].is_ascii_digit());
            assert_eq!(suffix[2], 'A');
        }
    }

    #[test]
    fn reset_rejects_mismatch_before_length() {
        let err = validate_reset("abc", "abd").expect_err("mismatch");
        assert_eq!(err.to_string(), "Passwords do not match");
        let err = validate_reset("abc", "abc").expect_err("too short");
        assert_eq!(err.to_string(), "Password must be at least 6 characters");
        validate_reset("secret1", "secret1").expect("valid");
    }

    #[test]
    fn change_only_requires_matching_confirmation() {
        assert!(validate_change("x", "y").is_err());
        validate_change("x", "x").expect("matching");
    }
}
