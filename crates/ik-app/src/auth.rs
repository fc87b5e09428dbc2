use std::sync::Arc;

use tokio::sync::watch;

use ik_core::{
    are_fields_complete, is_password_valid, AuthResponse, BiometricOutcome, CoreError,
    IdentityProvider, UserRequest,
};

use crate::SessionManager;

pub const LOGIN_SUCCESS: &str = "Login successful. Redirecting...";
pub const LOGIN_FAILURE: &str = "Login incorrect";
pub const REGISTER_SUCCESS: &str = "Registration successful. Welcome.";
pub const REGISTER_DUPLICATE: &str = "Registration failed: this email is already registered.";
pub const REGISTER_FAILURE: &str = "Registration failed: an unexpected error occurred.";
pub const BIOMETRIC_SUCCESS: &str = "Biometric check passed.";
pub const BIOMETRIC_FAILURE: &str = "Biometric check failed";

/// Shared handle to the identity provider.
pub type SharedIdentity = Arc<dyn IdentityProvider + Send + Sync>;

/// Marshals credentials to the identity provider and results back as display-ready responses.
#[derive(Clone)]
pub struct AuthRepository {
    provider: SharedIdentity,
}

impl AuthRepository {
    pub fn new(provider: SharedIdentity) -> Self {
        Self { provider }
    }

    pub async fn register_user(&self, request: UserRequest) -> AuthResponse {
        let provider = Arc::clone(&self.provider);
        let result = tokio::task::spawn_blocking(move || {
            provider.register(&request.email, &request.password)
        })
        .await
        .map_err(|err| CoreError::Storage(err.to_string()))
        .and_then(|inner| inner);

        match result {
            Ok(email) => success(REGISTER_SUCCESS, email),
            Err(CoreError::Duplicate(_)) => failure(REGISTER_DUPLICATE),
            Err(err) => {
                tracing::warn!(error = %err, "registration failed");
                failure(REGISTER_FAILURE)
            }
        }
    }

    /// Every failure reads "Login incorrect" regardless of cause.
    pub async fn login_user(&self, email: &str, password: &str) -> AuthResponse {
        let provider = Arc::clone(&self.provider);
        let (email, password) = (email.to_string(), password.to_string());
        let result = tokio::task::spawn_blocking(move || provider.sign_in(&email, &password))
            .await
            .map_err(|err| CoreError::Storage(err.to_string()))
            .and_then(|inner| inner);

        match result {
            Ok(email) => success(LOGIN_SUCCESS, email),
            Err(err) => {
                tracing::debug!(error = %err, "login rejected");
                failure(LOGIN_FAILURE)
            }
        }
    }
}

fn success(message: &str, email: String) -> AuthResponse {
    AuthResponse {
        is_successful: true,
        message: message.to_string(),
        email: Some(email),
    }
}

fn failure(message: &str) -> AuthResponse {
    AuthResponse {
        is_successful: false,
        message: message.to_string(),
        email: None,
    }
}

/// Observable state for the login screen.
pub struct LoginViewModel {
    auth: AuthRepository,
    session: SessionManager,
    auth_result: watch::Sender<Option<AuthResponse>>,
    progress: watch::Sender<bool>,
    password_valid: watch::Sender<Option<bool>>,
    fields_complete: watch::Sender<bool>,
}

impl LoginViewModel {
    pub fn new(auth: AuthRepository, session: SessionManager) -> Self {
        Self {
            auth,
            session,
            auth_result: watch::channel(None).0,
            progress: watch::channel(false).0,
            password_valid: watch::channel(None).0,
            fields_complete: watch::channel(false).0,
        }
    }

    pub fn auth_result(&self) -> watch::Receiver<Option<AuthResponse>> {
        self.auth_result.subscribe()
    }

    pub fn progress(&self) -> watch::Receiver<bool> {
        self.progress.subscribe()
    }

    pub fn password_valid(&self) -> watch::Receiver<Option<bool>> {
        self.password_valid.subscribe()
    }

    pub fn fields_complete(&self) -> watch::Receiver<bool> {
        self.fields_complete.subscribe()
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_logged_in()
    }

    /// Re-run on every keystroke in the password field.
    pub fn validate_password(&self, password: &str) -> bool {
        let valid = is_password_valid(password);
        self.password_valid.send_replace(Some(valid));
        valid
    }

    /// Re-run on every keystroke in either credential field.
    pub fn check_fields_completion(&self, email: &str, password: &str) -> bool {
        let complete = are_fields_complete(email, password);
        self.fields_complete.send_replace(complete);
        complete
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthResponse {
        self.progress.send_replace(true);
        let response = self.auth.login_user(email, password).await;
        self.finish(response)
    }

    pub async fn register(&self, request: UserRequest) -> AuthResponse {
        self.progress.send_replace(true);
        let response = self.auth.register_user(request).await;
        self.finish(response)
    }

    /// Accept the outcome of a platform biometric prompt.
    ///
    /// The prompt itself belongs to the front end that owns a sensor; it passes the
    /// outcome here. The terminal front ends have no sensor and never call this.
    pub fn complete_biometric(&self, outcome: BiometricOutcome) -> AuthResponse {
        let response = match outcome {
            BiometricOutcome::Succeeded => AuthResponse {
                is_successful: true,
                message: BIOMETRIC_SUCCESS.to_string(),
                email: None,
            },
            BiometricOutcome::Failed(reason) => failure(&format!("{BIOMETRIC_FAILURE}: {reason}")),
        };
        self.finish(response)
    }

    fn finish(&self, response: AuthResponse) -> AuthResponse {
        if response.is_successful {
            if let Err(err) = self.session.save_login_state(true) {
                tracing::warn!(error = %err, "unable to persist session");
            }
        }
        self.auth_result.send_replace(Some(response.clone()));
        self.progress.send_replace(false);
        response
    }
}
