use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, post, put},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use super::dto::{
    AuthResponse, ChangePasswordRequest, DeleteAccountRequest, ForgotPasswordRequest,
    LoginRequest, MessageResponse, PublicUser, RefreshRequest, ResetPasswordRequest,
    SignUpRequest,
};
use super::{AuthError, AuthSession, AuthUser};
use crate::{
    error::AppError,
    profile::{
        services::{self as profiles, NewProfile},
        Role, UserProfile,
    },
    state::AppState,
    store::DocRef,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/seller/signup", post(seller_signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/password/forgot", post(forgot_password))
        .route("/auth/password/reset", post(reset_password))
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/me/password", put(change_password))
        .route("/me/account", delete(delete_account))
}

fn respond(session: AuthSession, profile: Option<UserProfile>) -> AuthResponse {
    let profile = profile.unwrap_or_default();
    AuthResponse {
        access_token: session.access_token,
        refresh_token: session.refresh_token,
        user: PublicUser {
            id: session.user.uid,
            email: session.user.email,
            role: profile.role,
            display_name: profile.display_name(),
        },
        landing: profile.landing(),
    }
}

fn blank(s: &str) -> bool {
    s.trim().is_empty()
}

async fn register(
    state: &AppState,
    payload: SignUpRequest,
    role: Role,
) -> Result<Json<AuthResponse>, AppError> {
    let mut required = vec![
        &payload.first_name,
        &payload.last_name,
        &payload.email,
        &payload.password,
        &payload.confirm_password,
    ];
    if role == Role::Seller {
        required.extend([&payload.store_name, &payload.contact_no]);
    }
    if required.into_iter().any(|f| blank(f)) {
        return Err(AppError::validation("Incomplete", "Please fill out all fields."));
    }
    if payload.password != payload.confirm_password {
        return Err(AppError::validation("Error", "Passwords do not match."));
    }

    let session = state.auth.sign_up(&payload.email, &payload.password).await?;
    let uid = session.user.doc_id();
    let seller = role == Role::Seller;
    let new = NewProfile {
        first_name: payload.first_name,
        last_name: payload.last_name,
        email: session.user.email.clone(),
        role,
        store_name: seller.then_some(payload.store_name),
        contact_no: seller.then_some(payload.contact_no),
    };
    let profile = match profiles::create(state, &uid, new).await {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, user_id = %uid, "profile create failed; removing account");
            if let Err(cleanup) = state.auth.delete_user(&session.user).await {
                error!(error = %cleanup, user_id = %uid, "account cleanup failed");
            }
            return Err(AppError::remote_write(
                "Sign Up Failed",
                "Could not create your profile.",
                e,
            ));
        }
    };

    info!(user_id = %uid, role = role.as_str(), "user registered");
    Ok(Json(respond(session, Some(profile))))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignUpRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    register(&state, payload, Role::User).await
}

#[instrument(skip(state, payload))]
pub async fn seller_signup(
    State(state): State<AppState>,
    Json(payload): Json<SignUpRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    register(&state, payload, Role::Seller).await
}

/// Sign in through one of the three portals. Seller and admin portals reject
/// accounts of another role and end the session they just opened.
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    if blank(&payload.email) || payload.password.is_empty() {
        return Err(AppError::validation(
            "Error",
            "Please enter both email and password.",
        ));
    }

    let session = state.auth.sign_in(&payload.email, &payload.password).await?;
    let profile = profiles::load(&state, &session.user.doc_id()).await?;

    let role = profile.as_ref().map(|p| p.role);
    let allowed = match payload.portal {
        Role::User => true,
        portal => role == Some(portal),
    };
    if !allowed {
        warn!(user_id = %session.user.uid, role = ?role, "wrong portal");
        state.auth.sign_out(&session.user).await?;
        return Err(AppError::Denied(payload.portal.portal_denied()));
    }

    info!(user_id = %session.user.uid, "user logged in");
    Ok(Json(respond(session, profile)))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let session = state.auth.refresh(&payload.refresh_token).await?;
    let profile = profiles::load(&state, &session.user.doc_id()).await?;
    Ok(Json(respond(session, profile)))
}

#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<StatusCode, AppError> {
    state.auth.sign_out(&user).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if blank(&payload.email) {
        return Err(AppError::validation("Error", "Please enter your email."));
    }
    state.auth.send_password_reset(&payload.email).await?;
    Ok(Json(MessageResponse {
        title: "Success",
        message: "Password reset instructions have been sent to your email.",
    }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .auth
        .confirm_password_reset(&payload.email, &payload.code, &payload.new_password)
        .await?;
    Ok(Json(MessageResponse {
        title: "Success",
        message: "Password changed.",
    }))
}

/// Reauthenticate with the current password, then set the new one. Returns a
/// fresh token pair since every older token stops working.
#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    if payload.current_password.is_empty() || payload.new_password.is_empty() {
        return Err(AppError::validation(
            "Error",
            "Enter both current and new password.",
        ));
    }
    match state.auth.reauthenticate(&user, &payload.current_password).await {
        Ok(()) => {}
        Err(AuthError::WrongPassword) => {
            return Err(AppError::validation("Error", "Wrong current password."))
        }
        Err(e) => return Err(e.into()),
    }
    let session = state.auth.change_password(&user, &payload.new_password).await?;
    let profile = profiles::load(&state, &user.doc_id()).await?;
    Ok(Json(respond(session, profile)))
}

/// Reauthenticate, drop the profile document (best effort), then delete the
/// account itself.
#[instrument(skip(state, payload))]
pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<DeleteAccountRequest>,
) -> Result<StatusCode, AppError> {
    if payload.password.is_empty() {
        return Err(AppError::validation(
            "Error",
            "Enter your current password to delete.",
        ));
    }
    match state.auth.reauthenticate(&user, &payload.password).await {
        Ok(()) => {}
        Err(AuthError::WrongPassword) => {
            return Err(AppError::validation("Error", "Wrong password."))
        }
        Err(e) => return Err(e.into()),
    }
    if let Err(e) = state.store.delete(&DocRef::user(&user.doc_id())).await {
        warn!(error = %e, user_id = %user.uid, "profile delete failed; continuing");
    }
    state.auth.delete_user(&user).await?;
    info!(user_id = %user.uid, "account deleted");
    Ok(StatusCode::NO_CONTENT)
}
