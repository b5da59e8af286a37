//! Display-name policy for signed-in users.

use crate::claims::IdentityClaims;
use crate::error::ProfileError;

/// Derives the name shown for a signed-in user.
///
/// Precedence: the configured preferred-name claim, then first and last name,
/// then the local part of the email address. Whitespace-only candidates are
/// skipped.
///
/// # Errors
///
/// Returns [`ProfileError::MissingDisplayName`] when no candidate yields a
/// non-empty string.
pub fn display_name(
    claims: &IdentityClaims,
    preferred_name_claim: Option<&str>,
) -> Result<String, ProfileError> {
    if let Some(claim_name) = preferred_name_claim {
        if let Some(preferred) = claims.claim(claim_name) {
            let preferred = preferred.trim();
            if !preferred.is_empty() {
                return Ok(preferred.to_string());
            }
        }
    }

    let full_name = [claims.first_name.as_deref(), claims.last_name.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if !full_name.is_empty() {
        return Ok(full_name);
    }

    if let Some(email) = claims.email.as_deref() {
        if let Some(local_part) = email.split('@').next() {
            let local_part = local_part.trim();
            if !local_part.is_empty() {
                return Ok(local_part.to_string());
            }
        }
    }

    Err(ProfileError::MissingDisplayName)
}
