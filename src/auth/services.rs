use tracing::{info, warn};

use crate::{
    auth::{
        jwt::JwtKeys,
        password::{hash_password_blocking, verify_against_dummy, verify_password_blocking},
        repo::{CreateUserError, UserStore},
        repo_types::{NewUser, User},
        validation::{ValidLogin, ValidSignup},
    },
    error::ApiError,
};

const SIGNUP_FAILED: &str = "Signup failed";
const LOGIN_FAILED: &str = "Login failed";

pub struct SignedUp {
    pub user: User,
    /// Present only when signup also logs the user in.
    pub token: Option<String>,
}

pub async fn signup(
    store: &dyn UserStore,
    keys: &JwtKeys,
    issue_token: bool,
    input: ValidSignup,
) -> Result<SignedUp, ApiError> {
    let existing = store
        .find_by_email(&input.email)
        .await
        .map_err(ApiError::internal(SIGNUP_FAILED))?;
    if existing.is_some() {
        warn!(email = %input.email, "email already registered");
        return Err(ApiError::Conflict);
    }

    let password_hash = hash_password_blocking(input.password)
        .await
        .map_err(ApiError::internal(SIGNUP_FAILED))?;

    let new_user = NewUser {
        firstname: input.firstname,
        lastname: input.lastname,
        email: input.email,
        password_hash,
    };
    let user = match store.create(new_user).await {
        Ok(u) => u,
        // lost a race with a concurrent signup for the same email
        Err(CreateUserError::Duplicate) => {
            warn!("email registered concurrently");
            return Err(ApiError::Conflict);
        }
        Err(CreateUserError::Other(e)) => return Err(ApiError::internal(SIGNUP_FAILED)(e)),
    };

    let token = if issue_token {
        Some(keys.sign(user.id).map_err(ApiError::internal(SIGNUP_FAILED))?)
    } else {
        None
    };

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(SignedUp { user, token })
}

pub async fn login(
    store: &dyn UserStore,
    keys: &JwtKeys,
    input: ValidLogin,
) -> Result<String, ApiError> {
    let user = match store
        .find_by_email(&input.email)
        .await
        .map_err(ApiError::internal(LOGIN_FAILED))?
    {
        Some(u) => u,
        None => {
            warn!(email = %input.email, "login unknown email");
            verify_against_dummy(input.password).await;
            return Err(ApiError::InvalidCredentials);
        }
    };

    let ok = verify_password_blocking(input.password, user.password_hash.clone())
        .await
        .map_err(ApiError::internal(LOGIN_FAILED))?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let token = keys.sign(user.id).map_err(ApiError::internal(LOGIN_FAILED))?;

    info!(user_id = %user.id, "user logged in");
    Ok(token)
}
