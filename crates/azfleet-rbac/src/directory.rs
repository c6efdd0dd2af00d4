//! Directory lookups for principals.

use azfleet_az::{AzCommand, AzGateway};
use azfleet_core::PrincipalId;
use tracing::{info, warn};

use crate::types::DirectoryUser;

/// What a directory lookup says about a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The principal resolves to a live user.
    Exists(DirectoryUser),
    /// The directory confirmed the principal does not exist.
    Orphaned,
    /// The lookup failed for another reason; the error text is kept.
    Unknown(String),
}

impl Verdict {
    /// Only a confirmed "does not exist" counts as orphaned.
    #[must_use]
    pub fn is_orphaned(&self) -> bool {
        matches!(self, Self::Orphaned)
    }
}

/// Look a principal up with `ad user show`.
pub async fn lookup_principal<G: AzGateway + ?Sized>(
    az: &G,
    principal: &PrincipalId,
    description: &str,
) -> Verdict {
    let command = AzCommand::new(["ad", "user", "show"]).flag("--id", principal.as_str());
    match az.run(&command, description, false).await {
        Ok(value) => {
            let user: DirectoryUser = serde_json::from_value(value).unwrap_or_default();
            info!(principal = %principal, "User exists as: {} therefore is not an orphan!", user.display());
            Verdict::Exists(user)
        }
        Err(e) if e.is_not_found() => {
            info!(principal = %principal, "verified this user really does not exist");
            Verdict::Orphaned
        }
        Err(e) => {
            warn!(principal = %principal, error = %e, "Unexpected error, please try {principal} again later");
            Verdict::Unknown(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use azfleet_az::{MockAz, MockReply};
    use serde_json::json;

    use super::*;

    fn pid(s: &str) -> PrincipalId {
        PrincipalId::new(s).unwrap()
    }

    #[tokio::test]
    async fn existing_user() {
        let az = MockAz::new();
        az.on(
            "ad user show --id abc",
            MockReply::Json(json!({"givenName": "Ada", "surname": "L", "userPrincipalName": "ada@x"})),
        );
        let verdict = lookup_principal(&az, &pid("abc"), "check").await;
        assert!(matches!(verdict, Verdict::Exists(ref u) if u.given_name.as_deref() == Some("Ada")));
        assert_eq!(az.calls(), vec!["ad user show --id abc".to_string()]);
    }

    #[tokio::test]
    async fn deleted_user_is_orphaned() {
        let az = MockAz::new();
        az.on(
            "ad user show",
            MockReply::Fail("ERROR: Resource 'abc' does not exist or one of its queried reference-property objects are not present.".into()),
        );
        assert_eq!(lookup_principal(&az, &pid("abc"), "check").await, Verdict::Orphaned);
    }

    #[tokio::test]
    async fn other_failure_is_unknown() {
        let az = MockAz::new();
        az.on("ad user show", MockReply::Fail("Insufficient privileges".into()));
        let verdict = lookup_principal(&az, &pid("abc"), "check").await;
        assert!(matches!(verdict, Verdict::Unknown(ref m) if m.contains("Insufficient privileges")));
        assert!(!verdict.is_orphaned());
    }
}
