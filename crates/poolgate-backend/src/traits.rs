//! Backend traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use poolgate_core::BackendError;

/// Identity service actions used by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Create a user as an administrator.
    AdminCreateUser,
    /// Start an authentication flow as an administrator.
    AdminInitiateAuth,
    /// Answer an authentication challenge.
    AdminRespondToAuthChallenge,
    /// Invalidate every session of a user.
    AdminUserGlobalSignOut,
    /// Force a password reset.
    AdminResetUserPassword,
    /// Replace user attributes.
    AdminUpdateUserAttributes,
    /// Read a user.
    AdminGetUser,
    /// Send a password recovery code.
    ForgotPassword,
    /// Set a new password using a recovery code.
    ConfirmForgotPassword,
    /// Self-service registration.
    SignUp,
    /// Confirm a self-service registration.
    ConfirmSignUp,
}

impl Action {
    /// Wire name of the action.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AdminCreateUser => "AdminCreateUser",
            Self::AdminInitiateAuth => "AdminInitiateAuth",
            Self::AdminRespondToAuthChallenge => "AdminRespondToAuthChallenge",
            Self::AdminUserGlobalSignOut => "AdminUserGlobalSignOut",
            Self::AdminResetUserPassword => "AdminResetUserPassword",
            Self::AdminUpdateUserAttributes => "AdminUpdateUserAttributes",
            Self::AdminGetUser => "AdminGetUser",
            Self::ForgotPassword => "ForgotPassword",
            Self::ConfirmForgotPassword => "ConfirmForgotPassword",
            Self::SignUp => "SignUp",
            Self::ConfirmSignUp => "ConfirmSignUp",
        }
    }

    /// Value of the `X-Amz-Target` header for this action.
    #[must_use]
    pub fn target(self) -> String {
        format!("AWSCognitoIdentityProviderService.{}", self.name())
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity service the gateway delegates to.
///
/// Requests and results are opaque JSON objects; the backend neither adds
/// nor checks fields beyond what its protocol requires.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Perform one action.
    async fn call(&self, action: Action, request: Value) -> Result<Value, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_target() {
        assert_eq!(
            Action::AdminInitiateAuth.target(),
            "AWSCognitoIdentityProviderService.AdminInitiateAuth"
        );
        assert_eq!(Action::ConfirmSignUp.to_string(), "ConfirmSignUp");
    }
}
