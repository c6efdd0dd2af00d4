//! Credential resolution and account selection.
//!
//! The tooling never handles secrets itself; it relies on whichever identity
//! the Azure CLI is signed in with. On fleet VMs that is a user-assigned
//! managed identity, on a developer box it is the interactive `az login`
//! account.

use serde_json::Value;
use tracing::info;

use crate::command::AzCommand;
use crate::error::Result;
use crate::gateway::AzGateway;

/// The platform identity the CLI should act as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Sign in with a managed identity identified by its client id.
    ManagedIdentity {
        /// Client id of the user-assigned identity.
        client_id: String,
    },
    /// Use the account already signed in with `az login`.
    AzureCli,
}

impl Credentials {
    /// Choose managed identity when a client id is configured, otherwise the
    /// interactive CLI account.
    #[must_use]
    pub fn from_client_id(client_id: Option<String>) -> Self {
        match client_id.filter(|id| !id.trim().is_empty()) {
            Some(client_id) => Self::ManagedIdentity { client_id },
            None => Self::AzureCli,
        }
    }

    /// Make sure the CLI is signed in with this identity.
    ///
    /// # Errors
    ///
    /// Returns the gateway error if login fails or no account is signed in.
    pub async fn establish<G: AzGateway + ?Sized>(&self, az: &G) -> Result<Value> {
        match self {
            Self::ManagedIdentity { client_id } => {
                let command = AzCommand::new(["login", "--identity"]).flag("--username", client_id);
                az.run(&command, "signing in with managed identity", true).await
            }
            Self::AzureCli => {
                let account = az
                    .run(
                        &AzCommand::new(["account", "show"]),
                        "checking signed-in Azure CLI account",
                        false,
                    )
                    .await?;
                if let Some(name) = account.get("name").and_then(Value::as_str) {
                    info!(account = %name, "using Azure CLI account");
                }
                Ok(account)
            }
        }
    }
}

/// Switch the CLI's default subscription.
///
/// # Errors
///
/// Returns the gateway error if the subscription cannot be selected.
pub async fn set_subscription<G: AzGateway + ?Sized>(az: &G, subscription: &str) -> Result<()> {
    info!(subscription = %subscription, "switching subscription");
    let command = AzCommand::new(["account", "set"]).flag("--subscription", subscription);
    az.run(&command, "switch subscription", true).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockAz, MockReply};
    use serde_json::json;

    #[test]
    fn credentials_selection() {
        assert_eq!(Credentials::from_client_id(None), Credentials::AzureCli);
        assert_eq!(Credentials::from_client_id(Some("  ".into())), Credentials::AzureCli);
        assert_eq!(
            Credentials::from_client_id(Some("abc".into())),
            Credentials::ManagedIdentity {
                client_id: "abc".into()
            }
        );
    }

    #[tokio::test]
    async fn managed_identity_logs_in() {
        let az = MockAz::new();
        Credentials::ManagedIdentity {
            client_id: "cid".into(),
        }
        .establish(&az)
        .await
        .unwrap();
        assert_eq!(az.calls(), vec!["login --identity --username cid".to_string()]);
    }

    #[tokio::test]
    async fn cli_account_must_exist() {
        let az = MockAz::new();
        az.on("account show", MockReply::Fail("Please run 'az login'".into()));
        assert!(Credentials::AzureCli.establish(&az).await.is_err());

        let az = MockAz::new();
        az.on("account show", MockReply::Json(json!({"name": "dev"})));
        let account = Credentials::AzureCli.establish(&az).await.unwrap();
        assert_eq!(account["name"], "dev");
    }

    #[tokio::test]
    async fn switch_subscription_command() {
        let az = MockAz::new();
        set_subscription(&az, "sub-9").await.unwrap();
        assert_eq!(az.calls(), vec!["account set --subscription sub-9".to_string()]);
    }
}
