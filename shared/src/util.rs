/// Emails are compared and stored lowercase with surrounding whitespace removed
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
