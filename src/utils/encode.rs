use crate::core::error::Error;

/// Login URL that brings the user back to `return_to` once they sign in again.
pub(crate) fn login_redirect(
    login_path: &str,
    reason: &str,
    return_to: &str,
) -> Result<String, Error> {
    let query = serde_urlencoded::to_string([("reason", reason), ("returnTo", return_to)])?;

    Ok(format!("{}?{}", login_path, query))
}
