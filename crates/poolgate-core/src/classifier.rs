//! Backend error classification.
//!
//! Every auth operation owns an ordered rule table: its own rules first,
//! then the rules shared by all operations, then an unconditional fallback.
//! Rules are evaluated top to bottom and the first match wins, so every
//! [`BackendError`] maps to exactly one [`ClassifiedError`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BackendError, ClassifiedError};

/// Message of the unconditional fallback rule.
pub const FALLBACK_MESSAGE: &str = "Something went wrong in the server";

const TOO_MANY_FAILED_ATTEMPTS: &str = "Too many fail attempts, please try again later";
const ATTEMPT_LIMIT_EXCEEDED: &str = "Attempt limit exceeded, please try after some time.";
const CODE_DELIVERY_FAILURE: &str =
    "There was a problem delivering the confirmation code for the user.";
const USERNAME_EXISTS: &str = "The username you are trying to use already exist.";

/// What a rule matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// Exact match on the backend error code.
    Code(&'static str),
    /// Matches every error.
    Any,
}

/// The message a matching rule produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Fixed client-facing message.
    Fixed(&'static str),
    /// Forward the backend's own message.
    Passthrough,
}

/// A single classification rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    /// Which errors this rule applies to.
    pub matcher: Matcher,
    /// HTTP status produced on match.
    pub status: u16,
    /// Message produced on match.
    pub reply: Reply,
}

impl Rule {
    /// Rule matching an exact backend error code.
    #[must_use]
    pub const fn code(code: &'static str, status: u16, reply: Reply) -> Self {
        Self {
            matcher: Matcher::Code(code),
            status,
            reply,
        }
    }

    /// The unconditional 500 rule that terminates every table.
    #[must_use]
    pub const fn fallback() -> Self {
        Self {
            matcher: Matcher::Any,
            status: 500,
            reply: Reply::Fixed(FALLBACK_MESSAGE),
        }
    }

    /// Whether this rule applies to `error`.
    #[must_use]
    pub fn matches(&self, error: &BackendError) -> bool {
        match self.matcher {
            Matcher::Code(code) => error.code == code,
            Matcher::Any => true,
        }
    }

    fn apply(&self, error: &BackendError) -> ClassifiedError {
        let message = match self.reply {
            Reply::Fixed(message) => message.to_string(),
            Reply::Passthrough => error.message.clone(),
        };
        ClassifiedError::new(self.status, message)
    }
}

/// Rules checked by every operation after its own rules.
pub const SHARED_RULES: &[Rule] = &[
    Rule::code("InvalidParameterException", 400, Reply::Passthrough),
    Rule::code(
        "AliasExistsException",
        400,
        Reply::Fixed("An Account with this email already exists."),
    ),
    Rule::code(
        "CodeMismatchException",
        400,
        Reply::Fixed("Confirmation code does not match with the one provided through email."),
    ),
    Rule::code(
        "ExpiredCodeException",
        400,
        Reply::Fixed("Confirmation code has expired."),
    ),
    Rule::code(
        "TooManyRequestsException",
        400,
        Reply::Fixed("Too many requests to this service, please try again later."),
    ),
    Rule::code(
        "InvalidPasswordException",
        400,
        Reply::Fixed("The password does not meet the configure password criteria."),
    ),
    Rule::code("NotAuthorizedException", 400, Reply::Passthrough),
    Rule::code("ResourceNotFoundException", 400, Reply::Passthrough),
    Rule::code("UserNotFoundException", 400, Reply::Passthrough),
    Rule::code(
        "UserNotConfirmedException",
        400,
        Reply::Fixed("Your user is not confirmed yet, please contact support."),
    ),
];

const CREATE_USER_RULES: &[Rule] = &[
    Rule::code("CodeDeliveryFailureException", 400, Reply::Fixed(CODE_DELIVERY_FAILURE)),
    Rule::code(
        "UnsupportedUserStateException",
        400,
        Reply::Fixed(
            "A problem with user state happened, probably because the user exist already in an \
             unsupported state.",
        ),
    ),
    Rule::code("UsernameExistsException", 400, Reply::Fixed(USERNAME_EXISTS)),
];

const LOGIN_RULES: &[Rule] = &[Rule::code(
    "PasswordResetRequiredException",
    400,
    Reply::Fixed("Finish resetting your password to be able to login"),
)];

const CONFIRM_LOGIN_RULES: &[Rule] = &[
    Rule::code(
        "InvalidUserPoolConfigurationException",
        400,
        Reply::Fixed("Please make sure that the User Pool is configured properly."),
    ),
    Rule::code(
        "PasswordResetRequiredException",
        400,
        Reply::Fixed("A Password reset is required."),
    ),
];

const FORGOT_PASSWORD_RULES: &[Rule] = &[
    Rule::code("LimitExceededException", 429, Reply::Fixed(ATTEMPT_LIMIT_EXCEEDED)),
    Rule::code("TooManyFailedAttemptsException", 429, Reply::Fixed(TOO_MANY_FAILED_ATTEMPTS)),
    Rule::code(
        "UserNotConfirmedException",
        400,
        Reply::Fixed("Your user is not confirmed, please login and confirm it first"),
    ),
    Rule::code(
        "InvalidEmailRoleAccessPolicyException",
        400,
        Reply::Fixed("Your email is not confirmed, please contact an Admin for support."),
    ),
];

const SIGN_UP_RULES: &[Rule] = &[
    Rule::code(
        "InvalidEmailRoleAccessPolicyException",
        400,
        Reply::Fixed("For some reason your email could not be use for sign up."),
    ),
    Rule::code("CodeDeliveryFailureException", 400, Reply::Fixed(CODE_DELIVERY_FAILURE)),
    Rule::code("UsernameExistsException", 400, Reply::Fixed(USERNAME_EXISTS)),
];

const CONFIRM_SIGN_UP_RULES: &[Rule] = &[
    Rule::code("InvalidParameterException", 400, Reply::Passthrough),
    Rule::code("TooManyFailedAttemptsException", 400, Reply::Fixed(TOO_MANY_FAILED_ATTEMPTS)),
    Rule::code("LimitExceededException", 429, Reply::Fixed(ATTEMPT_LIMIT_EXCEEDED)),
];

/// Auth operations exposed by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    /// Admin-created user.
    CreateUser,
    /// Username/password login.
    Login,
    /// Answer to a `NEW_PASSWORD_REQUIRED` challenge.
    ConfirmLogin,
    /// Global sign-out of a user.
    Logout,
    /// Admin-initiated password reset.
    ResetPassword,
    /// Update of user attributes.
    UpdateUser,
    /// Self-service forgot password.
    ForgotPassword,
    /// Confirmation of a forgot-password code with a new password.
    ConfirmNewPassword,
    /// Self-service sign-up.
    SignUp,
    /// Confirmation of a sign-up code.
    ConfirmSignUp,
    /// Read of a user's attributes.
    GetUser,
    /// Exchange of a refresh token for new tokens.
    RefreshToken,
}

impl Operation {
    /// Every operation, in route order.
    pub const ALL: [Self; 12] = [
        Self::CreateUser,
        Self::Login,
        Self::ConfirmLogin,
        Self::Logout,
        Self::ResetPassword,
        Self::UpdateUser,
        Self::ForgotPassword,
        Self::ConfirmNewPassword,
        Self::SignUp,
        Self::ConfirmSignUp,
        Self::GetUser,
        Self::RefreshToken,
    ];

    /// Stable operation name, used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CreateUser => "create-user",
            Self::Login => "login",
            Self::ConfirmLogin => "confirm-login",
            Self::Logout => "logout",
            Self::ResetPassword => "reset-password",
            Self::UpdateUser => "update-user",
            Self::ForgotPassword => "forgot-password",
            Self::ConfirmNewPassword => "confirm-new-password",
            Self::SignUp => "sign-up",
            Self::ConfirmSignUp => "confirm-sign-up",
            Self::GetUser => "get-user",
            Self::RefreshToken => "refresh-token",
        }
    }

    /// Rules checked before the shared rules.
    ///
    /// The password reset family shares the forgot-password table.
    #[must_use]
    pub const fn specific_rules(self) -> &'static [Rule] {
        match self {
            Self::CreateUser => CREATE_USER_RULES,
            Self::Login => LOGIN_RULES,
            Self::ConfirmLogin => CONFIRM_LOGIN_RULES,
            Self::ResetPassword | Self::ForgotPassword | Self::ConfirmNewPassword => {
                FORGOT_PASSWORD_RULES
            }
            Self::SignUp => SIGN_UP_RULES,
            Self::ConfirmSignUp => CONFIRM_SIGN_UP_RULES,
            Self::Logout | Self::UpdateUser | Self::GetUser | Self::RefreshToken => &[],
        }
    }

    /// The classifier for this operation.
    #[must_use]
    pub fn classifier(self) -> Classifier {
        let rules = self
            .specific_rules()
            .iter()
            .chain(SHARED_RULES)
            .copied()
            .chain(std::iter::once(Rule::fallback()))
            .collect();

        Classifier {
            name: self.name(),
            rules,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered, first-match-wins rule table.
#[derive(Debug, Clone)]
pub struct Classifier {
    name: &'static str,
    rules: Vec<Rule>,
}

impl Classifier {
    /// Build a classifier from an arbitrary rule list.
    ///
    /// The fallback rule is appended, so the table stays total.
    #[must_use]
    pub fn custom(name: &'static str, rules: impl IntoIterator<Item = Rule>) -> Self {
        let rules = rules
            .into_iter()
            .chain(std::iter::once(Rule::fallback()))
            .collect();
        Self { name, rules }
    }

    /// Classifier name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The ordered rule table, fallback last.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Map a backend error to the client-facing error.
    ///
    /// The error is logged before classification.
    #[must_use]
    pub fn classify(&self, error: &BackendError) -> ClassifiedError {
        tracing::error!(
            operation = self.name,
            code = %error.code,
            message = %error.message,
            "Backend call failed"
        );

        self.rules
            .iter()
            .find(|rule| rule.matches(error))
            .map_or_else(ClassifiedError::internal, |rule| rule.apply(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn classify(op: Operation, code: &str, message: &str) -> ClassifiedError {
        op.classifier().classify(&BackendError::new(code, message))
    }

    #[test]
    fn test_username_exists_on_create_user() {
        let result = classify(Operation::CreateUser, "UsernameExistsException", "exists");
        assert_eq!(
            result,
            ClassifiedError::new(400, "The username you are trying to use already exist.")
        );
    }

    #[test]
    fn test_too_many_requests_on_every_operation() {
        for op in Operation::ALL {
            let result = classify(op, "TooManyRequestsException", "slow down");
            assert_eq!(
                result,
                ClassifiedError::new(
                    400,
                    "Too many requests to this service, please try again later."
                ),
                "operation {op}"
            );
        }
    }

    #[test]
    fn test_unknown_code_falls_back_on_every_operation() {
        for op in Operation::ALL {
            let result = classify(op, "SomeUnknownException", "boom");
            assert_eq!(
                result,
                ClassifiedError::new(500, "Something went wrong in the server"),
                "operation {op}"
            );
        }
    }

    #[test]
    fn test_passthrough_rules_forward_backend_message() {
        for code in [
            "InvalidParameterException",
            "NotAuthorizedException",
            "ResourceNotFoundException",
            "UserNotFoundException",
        ] {
            let result = classify(Operation::GetUser, code, "backend said so");
            assert_eq!(result, ClassifiedError::new(400, "backend said so"), "{code}");
        }
    }

    #[test]
    fn test_shared_fixed_messages() {
        let cases = [
            ("AliasExistsException", "An Account with this email already exists."),
            (
                "CodeMismatchException",
                "Confirmation code does not match with the one provided through email.",
            ),
            ("ExpiredCodeException", "Confirmation code has expired."),
            (
                "InvalidPasswordException",
                "The password does not meet the configure password criteria.",
            ),
            (
                "UserNotConfirmedException",
                "Your user is not confirmed yet, please contact support.",
            ),
        ];

        for (code, message) in cases {
            let result = classify(Operation::UpdateUser, code, "ignored");
            assert_eq!(result, ClassifiedError::new(400, message), "{code}");
        }
    }

    #[test]
    fn test_create_user_specific_rules() {
        assert_eq!(
            classify(Operation::CreateUser, "CodeDeliveryFailureException", "").message,
            "There was a problem delivering the confirmation code for the user."
        );
        assert_eq!(
            classify(Operation::CreateUser, "UnsupportedUserStateException", ""),
            ClassifiedError::new(
                400,
                "A problem with user state happened, probably because the user exist already in \
                 an unsupported state."
            )
        );
    }

    #[test]
    fn test_login_password_reset_required() {
        assert_eq!(
            classify(Operation::Login, "PasswordResetRequiredException", ""),
            ClassifiedError::new(400, "Finish resetting your password to be able to login")
        );
    }

    #[test]
    fn test_confirm_login_specific_rules() {
        assert_eq!(
            classify(Operation::ConfirmLogin, "InvalidUserPoolConfigurationException", ""),
            ClassifiedError::new(
                400,
                "Please make sure that the User Pool is configured properly."
            )
        );
        assert_eq!(
            classify(Operation::ConfirmLogin, "PasswordResetRequiredException", ""),
            ClassifiedError::new(400, "A Password reset is required.")
        );
    }

    #[test]
    fn test_password_reset_family_shares_forgot_password_rules() {
        for op in [
            Operation::ForgotPassword,
            Operation::ResetPassword,
            Operation::ConfirmNewPassword,
        ] {
            assert_eq!(
                classify(op, "LimitExceededException", ""),
                ClassifiedError::new(429, "Attempt limit exceeded, please try after some time.")
            );
            assert_eq!(
                classify(op, "TooManyFailedAttemptsException", ""),
                ClassifiedError::new(429, "Too many fail attempts, please try again later")
            );
            assert_eq!(
                classify(op, "InvalidEmailRoleAccessPolicyException", ""),
                ClassifiedError::new(
                    400,
                    "Your email is not confirmed, please contact an Admin for support."
                )
            );
        }
    }

    #[test]
    fn test_specific_rule_shadows_shared_rule() {
        assert_eq!(
            classify(Operation::ForgotPassword, "UserNotConfirmedException", "").message,
            "Your user is not confirmed, please login and confirm it first"
        );
        assert_eq!(
            classify(Operation::Login, "UserNotConfirmedException", "").message,
            "Your user is not confirmed yet, please contact support."
        );
    }

    #[test]
    fn test_sign_up_specific_rules() {
        assert_eq!(
            classify(Operation::SignUp, "InvalidEmailRoleAccessPolicyException", ""),
            ClassifiedError::new(400, "For some reason your email could not be use for sign up.")
        );
        assert_eq!(
            classify(Operation::SignUp, "CodeDeliveryFailureException", ""),
            ClassifiedError::new(
                400,
                "There was a problem delivering the confirmation code for the user."
            )
        );
        assert_eq!(
            classify(Operation::SignUp, "UsernameExistsException", ""),
            ClassifiedError::new(400, "The username you are trying to use already exist.")
        );
    }

    #[test]
    fn test_confirm_sign_up_specific_rules() {
        assert_eq!(
            classify(Operation::ConfirmSignUp, "TooManyFailedAttemptsException", ""),
            ClassifiedError::new(400, "Too many fail attempts, please try again later")
        );
        assert_eq!(
            classify(Operation::ConfirmSignUp, "LimitExceededException", "").status,
            429
        );
        assert_eq!(
            classify(Operation::ConfirmSignUp, "InvalidParameterException", "bad code"),
            ClassifiedError::new(400, "bad code")
        );
    }

    #[test]
    fn test_operation_without_specific_rule_falls_through() {
        assert_eq!(
            classify(Operation::Logout, "UsernameExistsException", "").status,
            500
        );
    }

    #[test]
    fn test_first_match_wins_on_ambiguous_table() {
        let classifier = Classifier::custom(
            "ambiguous",
            [
                Rule::code("DuplicateException", 409, Reply::Fixed("first")),
                Rule::code("DuplicateException", 400, Reply::Fixed("second")),
            ],
        );

        let result = classifier.classify(&BackendError::new("DuplicateException", ""));
        assert_eq!(result, ClassifiedError::new(409, "first"));
    }

    #[test]
    fn test_custom_classifier_is_total() {
        let classifier = Classifier::custom("empty", []);
        assert_eq!(classifier.rules(), &[Rule::fallback()]);
        assert_eq!(
            classifier.classify(&BackendError::new("Anything", "")).status,
            500
        );
    }

    #[test]
    fn test_every_table_ends_with_fallback() {
        for op in Operation::ALL {
            let classifier = op.classifier();
            assert_eq!(classifier.rules().last(), Some(&Rule::fallback()));
            assert_eq!(classifier.name(), op.name());
        }
    }
}
