//! Auth operations.
//!
//! Each operation takes the caller's request, overwrites the fields the
//! gateway controls (pool id, client id, auth flow, ...), makes exactly one
//! backend call and either returns the backend result untouched or the
//! operation's classified error.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use validator::Validate;

use poolgate_backend::{Action, IdentityBackend};
use poolgate_core::{Classifier, ClassifiedError, Operation};

/// A `Name`/`Value` user attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserAttribute {
    /// Attribute name.
    pub name: String,
    /// Attribute value.
    pub value: String,
}

impl UserAttribute {
    /// Create an attribute.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Request naming a single user.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct UsernameRequest {
    /// User name.
    #[validate(length(min = 1))]
    pub username: String,
    /// Forwarded unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `POST /user/create`.
pub type CreateUserRequest = UsernameRequest;

/// `POST /user/login`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct LoginRequest {
    /// `USERNAME` and `PASSWORD`.
    #[validate(nested)]
    pub auth_parameters: PasswordParameters,
    /// Forwarded unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Username/password auth parameters.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PasswordParameters {
    /// User name.
    #[serde(rename = "USERNAME")]
    #[validate(length(min = 1))]
    pub username: String,
    /// Password.
    #[serde(rename = "PASSWORD")]
    #[validate(length(min = 1))]
    pub password: String,
    /// Forwarded unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `POST /user/confirm-login`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct ConfirmLoginRequest {
    /// Answers to the new-password challenge.
    pub challenge_responses: Map<String, Value>,
    /// Session returned by the login call.
    #[validate(length(min = 1))]
    pub session: String,
    /// Forwarded unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `POST /user/update`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateUserRequest {
    /// User name.
    #[validate(length(min = 1))]
    pub username: String,
    /// Attributes to set.
    pub user_attributes: Vec<UserAttribute>,
    /// Forwarded unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `POST /user/confirm-new-password`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct ConfirmNewPasswordRequest {
    /// User name.
    #[validate(length(min = 1))]
    pub username: String,
    /// Code delivered by forgot-password.
    #[validate(length(min = 1))]
    pub confirmation_code: String,
    /// New password.
    #[validate(length(min = 1))]
    pub password: String,
    /// Forwarded unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `POST /user/sign-up`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct SignUpRequest {
    /// User name.
    #[validate(length(min = 1))]
    pub username: String,
    /// Password.
    #[validate(length(min = 1))]
    pub password: String,
    /// Forwarded unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `POST /user/confirm-sign-up`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct ConfirmSignUpRequest {
    /// User name.
    #[validate(length(min = 1))]
    pub username: String,
    /// Code delivered by sign-up.
    #[validate(length(min = 1))]
    pub confirmation_code: String,
    /// Forwarded unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `POST /user/token/refresh`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct RefreshTokenRequest {
    /// `REFRESH_TOKEN`.
    #[validate(nested)]
    pub auth_parameters: RefreshParameters,
    /// Forwarded unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Refresh-token auth parameters.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RefreshParameters {
    /// Refresh token from a previous login.
    #[serde(rename = "REFRESH_TOKEN")]
    #[validate(length(min = 1))]
    pub refresh_token: String,
    /// Forwarded unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `POST /user/token/validate`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct ValidateTokenRequest {
    /// `TOKEN`.
    #[validate(nested)]
    pub auth_parameters: TokenParameters,
}

/// Token-validation parameters.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TokenParameters {
    /// Access token to check.
    #[serde(rename = "TOKEN")]
    pub token: String,
}

/// Identifiers merged into backend requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolIds {
    /// User pool id.
    pub user_pool_id: String,
    /// App client id.
    pub client_id: String,
}

/// The gateway's auth operations bound to one backend and pool.
pub struct AuthOperations {
    backend: Arc<dyn IdentityBackend>,
    ids: PoolIds,
    classifiers: HashMap<Operation, Classifier>,
}

impl AuthOperations {
    /// Bind operations to a backend.
    #[must_use]
    pub fn new(backend: Arc<dyn IdentityBackend>, ids: PoolIds) -> Self {
        let classifiers = Operation::ALL
            .into_iter()
            .map(|op| (op, op.classifier()))
            .collect();

        Self {
            backend,
            ids,
            classifiers,
        }
    }

    /// Pool identifiers in use.
    #[must_use]
    pub const fn ids(&self) -> &PoolIds {
        &self.ids
    }

    /// Create a user; the pool emails the temporary password.
    ///
    /// # Errors
    ///
    /// Returns the create-user classification of any backend failure.
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<Value, ClassifiedError> {
        let mut payload = to_payload(&request)?;
        self.insert_pool_id(&mut payload);
        payload.insert("DesiredDeliveryMediums".into(), json!(["EMAIL"]));
        self.invoke(Operation::CreateUser, Action::AdminCreateUser, payload)
            .await
    }

    /// Log in with username and password.
    ///
    /// # Errors
    ///
    /// Returns the login classification of any backend failure.
    pub async fn login(&self, request: LoginRequest) -> Result<Value, ClassifiedError> {
        let mut payload = to_payload(&request)?;
        payload.insert("AuthFlow".into(), json!("ADMIN_NO_SRP_AUTH"));
        self.insert_client_id(&mut payload);
        self.insert_pool_id(&mut payload);
        self.invoke(Operation::Login, Action::AdminInitiateAuth, payload)
            .await
    }

    /// Answer the new-password challenge issued on first login.
    ///
    /// # Errors
    ///
    /// Returns the confirm-login classification of any backend failure.
    pub async fn confirm_login(
        &self,
        request: ConfirmLoginRequest,
    ) -> Result<Value, ClassifiedError> {
        let mut payload = to_payload(&request)?;
        payload.insert("ChallengeName".into(), json!("NEW_PASSWORD_REQUIRED"));
        self.insert_client_id(&mut payload);
        self.insert_pool_id(&mut payload);
        self.invoke(
            Operation::ConfirmLogin,
            Action::AdminRespondToAuthChallenge,
            payload,
        )
        .await
    }

    /// Sign a user out of every device.
    ///
    /// # Errors
    ///
    /// Returns the logout classification of any backend failure.
    pub async fn logout(&self, username: &str) -> Result<Value, ClassifiedError> {
        let payload = self.user_payload(username);
        self.invoke(Operation::Logout, Action::AdminUserGlobalSignOut, payload)
            .await
    }

    /// Force a password reset.
    ///
    /// # Errors
    ///
    /// Returns the forgot-password classification of any backend failure.
    pub async fn reset_password(&self, request: UsernameRequest) -> Result<Value, ClassifiedError> {
        let mut payload = to_payload(&request)?;
        self.insert_pool_id(&mut payload);
        self.invoke(
            Operation::ResetPassword,
            Action::AdminResetUserPassword,
            payload,
        )
        .await
    }

    /// Update user attributes, marking the email as verified.
    ///
    /// # Errors
    ///
    /// Returns the update-user classification of any backend failure.
    pub async fn update_user(
        &self,
        mut request: UpdateUserRequest,
    ) -> Result<Value, ClassifiedError> {
        request
            .user_attributes
            .push(UserAttribute::new("email_verified", "true"));
        let mut payload = to_payload(&request)?;
        self.insert_pool_id(&mut payload);
        self.invoke(
            Operation::UpdateUser,
            Action::AdminUpdateUserAttributes,
            payload,
        )
        .await
    }

    /// Send a password recovery code.
    ///
    /// # Errors
    ///
    /// Returns the forgot-password classification of any backend failure.
    pub async fn forgot_password(
        &self,
        request: UsernameRequest,
    ) -> Result<Value, ClassifiedError> {
        let mut payload = to_payload(&request)?;
        self.insert_client_id(&mut payload);
        self.invoke(Operation::ForgotPassword, Action::ForgotPassword, payload)
            .await
    }

    /// Set a new password with a recovery code.
    ///
    /// # Errors
    ///
    /// Returns the forgot-password classification of any backend failure.
    pub async fn confirm_new_password(
        &self,
        request: ConfirmNewPasswordRequest,
    ) -> Result<Value, ClassifiedError> {
        let mut payload = to_payload(&request)?;
        self.insert_client_id(&mut payload);
        self.invoke(
            Operation::ConfirmNewPassword,
            Action::ConfirmForgotPassword,
            payload,
        )
        .await
    }

    /// Self-service registration.
    ///
    /// # Errors
    ///
    /// Returns the sign-up classification of any backend failure.
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<Value, ClassifiedError> {
        let mut payload = to_payload(&request)?;
        self.insert_client_id(&mut payload);
        self.invoke(Operation::SignUp, Action::SignUp, payload).await
    }

    /// Confirm a registration with the emailed code.
    ///
    /// # Errors
    ///
    /// Returns the confirm-sign-up classification of any backend failure.
    pub async fn confirm_sign_up(
        &self,
        request: ConfirmSignUpRequest,
    ) -> Result<Value, ClassifiedError> {
        let mut payload = to_payload(&request)?;
        self.insert_client_id(&mut payload);
        payload.insert("ForceAliasCreation".into(), json!(false));
        self.invoke(Operation::ConfirmSignUp, Action::ConfirmSignUp, payload)
            .await
    }

    /// Read a user.
    ///
    /// # Errors
    ///
    /// Returns the get-user classification of any backend failure.
    pub async fn get_user(&self, username: &str) -> Result<Value, ClassifiedError> {
        let payload = self.user_payload(username);
        self.invoke(Operation::GetUser, Action::AdminGetUser, payload)
            .await
    }

    /// Exchange a refresh token for new tokens.
    ///
    /// # Errors
    ///
    /// Returns the refresh-token classification of any backend failure.
    pub async fn refresh_token(
        &self,
        request: RefreshTokenRequest,
    ) -> Result<Value, ClassifiedError> {
        let mut payload = to_payload(&request)?;
        payload.insert("AuthFlow".into(), json!("REFRESH_TOKEN_AUTH"));
        self.insert_client_id(&mut payload);
        self.insert_pool_id(&mut payload);
        self.invoke(Operation::RefreshToken, Action::AdminInitiateAuth, payload)
            .await
    }

    async fn invoke(
        &self,
        operation: Operation,
        action: Action,
        payload: Map<String, Value>,
    ) -> Result<Value, ClassifiedError> {
        tracing::debug!(operation = %operation, action = %action, "Invoking backend");

        match self.backend.call(action, Value::Object(payload)).await {
            Ok(result) => Ok(result),
            Err(error) => Err(match self.classifiers.get(&operation) {
                Some(classifier) => classifier.classify(&error),
                None => operation.classifier().classify(&error),
            }),
        }
    }

    fn user_payload(&self, username: &str) -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert("Username".into(), json!(username));
        self.insert_pool_id(&mut payload);
        payload
    }

    fn insert_pool_id(&self, payload: &mut Map<String, Value>) {
        payload.insert("UserPoolId".into(), json!(self.ids.user_pool_id));
    }

    fn insert_client_id(&self, payload: &mut Map<String, Value>) {
        payload.insert("ClientId".into(), json!(self.ids.client_id));
    }
}

impl std::fmt::Debug for AuthOperations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthOperations")
            .field("backend", &self.backend.name())
            .field("ids", &self.ids)
            .finish_non_exhaustive()
    }
}

fn to_payload<T: Serialize>(request: &T) -> Result<Map<String, Value>, ClassifiedError> {
    match serde_json::to_value(request) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) | Err(_) => Err(ClassifiedError::internal()),
    }
}
