//! Server-side input rules. Clients may check the same things for UX, but
//! these are the ones that count.

pub const USERNAME_MIN_LEN: usize = 2;
pub const USERNAME_MAX_LEN: usize = 20;
pub const PASSWORD_MIN_LEN: usize = 6;
pub const EMAIL_MAX_LEN: usize = 254;
pub const MESSAGE_MIN_LEN: usize = 10;
pub const MESSAGE_MAX_LEN: usize = 300;
pub const VERIFY_CODE_LEN: usize = 6;

pub fn validate_username(username: &str) -> Result<(), &'static str> {
    let len = username.chars().count();
    if len < USERNAME_MIN_LEN {
        return Err("Username must be at least 2 characters long.");
    }
    if len > USERNAME_MAX_LEN {
        return Err("Username must be at most 20 characters long.");
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err("Username must not contain special characters.");
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), &'static str> {
    const INVALID: &str = "Invalid email address.";

    if email.is_empty() || email.len() > EMAIL_MAX_LEN {
        return Err(INVALID);
    }
    if email.chars().any(char::is_whitespace) {
        return Err(INVALID);
    }

    let (local, domain) = email.split_once('@').ok_or(INVALID)?;
    if local.is_empty() || domain.contains('@') {
        return Err(INVALID);
    }

    // Domain needs at least two non-empty labels.
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(INVALID);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err("Password must be at least 6 characters long.");
    }
    Ok(())
}

/// Length is counted in characters, not bytes, and nothing is trimmed.
pub fn validate_message_content(content: &str) -> Result<(), &'static str> {
    let len = content.chars().count();
    if len < MESSAGE_MIN_LEN {
        return Err("Message content must be at least 10 characters long.");
    }
    if len > MESSAGE_MAX_LEN {
        return Err("Message content must be at most 300 characters long.");
    }
    Ok(())
}

pub fn validate_verify_code(code: &str) -> Result<(), &'static str> {
    if code.len() != VERIFY_CODE_LEN || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err("Verification code must be 6 digits.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        assert!(validate_username("al").is_ok());
        assert!(validate_username("alice_99").is_ok());
        assert!(validate_username(&"a".repeat(20)).is_ok());

        assert!(validate_username("a").is_err());
        assert!(validate_username(&"a".repeat(21)).is_err());
        assert!(validate_username("alice!").is_err());
        assert!(validate_username("al ice").is_err());
        assert!(validate_username("älice").is_err());
    }

    #[test]
    fn email_rules() {
        assert!(validate_email("a@x.com").is_ok());
        assert!(validate_email("first.last+tag@mail.example.org").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign.com").is_err());
        assert!(validate_email("@x.com").is_err());
        assert!(validate_email("a@localhost").is_err());
        assert!(validate_email("a@x..com").is_err());
        assert!(validate_email("a@b@x.com").is_err());
        assert!(validate_email("a b@x.com").is_err());
    }

    #[test]
    fn message_length_is_inclusive() {
        assert!(validate_message_content(&"x".repeat(9)).is_err());
        assert!(validate_message_content(&"x".repeat(10)).is_ok());
        assert!(validate_message_content(&"x".repeat(300)).is_ok());
        assert!(validate_message_content(&"x".repeat(301)).is_err());
    }

    #[test]
    fn message_length_counts_chars() {
        // 10 multi-byte characters, 30 bytes
        assert!(validate_message_content(&"é".repeat(10)).is_ok());
        assert!(validate_message_content(&"日".repeat(300)).is_ok());
    }

    #[test]
    fn verify_code_shape() {
        assert!(validate_verify_code("000000").is_ok());
        assert!(validate_verify_code("12345").is_err());
        assert!(validate_verify_code("12345a").is_err());
    }
}
