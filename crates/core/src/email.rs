use validator::ValidateEmail;

/// Syntax check applied by the HTTP adapter before any upstream call.
///
/// Addresses must also name a dotted domain, so `jane@localhost` is rejected.
pub fn is_valid_email(candidate: &str) -> bool {
    if !candidate.validate_email() {
        return false;
    }

    candidate.rsplit_once('@').map(|(_, domain)| domain.contains('.')).unwrap_or(false)
}

/// Domain half of an address, for log fields that must not carry the full email.
pub fn email_domain(email: &str) -> &str {
    email.rsplit_once('@').map(|(_, domain)| domain).unwrap_or("unknown")
}
