use axum::extract::{Multipart, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::ability::Tier;
use crate::auth::credentials::{generate_otp, hash_password, otp_matches, verify_password};
use crate::auth::session;
use crate::error::{AppError, AppResult};
use crate::extractors::{session_token, CurrentUser};
use crate::mail::templates::{AdminRequestEmail, OtpEmail};
use crate::routes::uploads::store_image;
use crate::state::AppState;
use crate::users;

const MIN_PASSWORD_LEN: usize = 6;

// -- Request types --

#[derive(Deserialize)]
pub struct AuthRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    pub pin: String,
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub new_name: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
}

#[derive(Deserialize)]
pub struct AdminRequest {
    pub reason: String,
}

// -- Cookie helpers --

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", name)
}

fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_ascii_lowercase();
    email
        .parse::<lettre::Address>()
        .map_err(|_| AppError::BadRequest("Invalid email address".into()))?;
    Ok(email)
}

// -- Handlers --

/// POST /api/auth — log in, or register when the email is unknown.
pub async fn authenticate(
    State(state): State<AppState>,
    Json(req): Json<AuthRequest>,
) -> AppResult<Response> {
    let email = normalize_email(&req.email)?;
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let cookie_name = state.config.auth.cookie_name.clone();
    let hours = state.config.auth.session_hours;

    let existing = {
        let conn = state.db.get()?;
        users::credentials_by_email(&conn, &email)?
    };

    if let Some(creds) = existing {
        let valid = creds
            .password_hash
            .as_deref()
            .map(|hash| verify_password(&req.password, hash))
            .unwrap_or(false);
        if !valid {
            tracing::info!(user_id = %creds.user.id, "Rejected login: bad password");
            return Err(AppError::Unauthorized);
        }

        let token = {
            let conn = state.db.get()?;
            session::create_session(&conn, &creds.user.id, hours)?
        };
        tracing::info!(user_id = %creds.user.id, "User logged in");
        return Ok((
            StatusCode::OK,
            AppendHeaders([(header::SET_COOKIE, session_cookie(&cookie_name, &token, hours))]),
            Json(json!({ "message": "Logged in successfully", "user": creds.user })),
        )
            .into_response());
    }

    let hash = hash_password(&req.password).map_err(|e| AppError::Internal(e.to_string()))?;
    let otp = generate_otp();
    let (user, token) = {
        let conn = state.db.get()?;
        let user = users::create(&conn, &email, &hash)?;
        users::set_otp(&conn, &user.id, &otp)?;
        let token = session::create_session(&conn, &user.id, hours)?;
        (user, token)
    };
    tracing::info!(user_id = %user.id, "User registered");

    // The account exists either way; a failed OTP mail can be retried via resend.
    let otp_mail = OtpEmail { otp: &otp }.to_mail(&user.email);
    match otp_mail {
        Ok(mail) => {
            if let Err(e) = state.mailer.send(mail).await {
                tracing::error!(user_id = %user.id, "Failed to send OTP email: {}", e);
            }
        }
        Err(e) => tracing::error!("Failed to render OTP email: {}", e),
    }

    Ok((
        StatusCode::CREATED,
        AppendHeaders([(header::SET_COOKIE, session_cookie(&cookie_name, &token, hours))]),
        Json(json!({ "message": "Registered successfully", "user": user })),
    )
        .into_response())
}

/// GET /api/auth/me
pub async fn me(CurrentUser(user): CurrentUser) -> AppResult<Response> {
    let tier = Tier::for_user(Some(&user));
    Ok(Json(json!({ "user": user, "tier": tier })).into_response())
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    _user: CurrentUser,
) -> AppResult<Response> {
    let cookie_name = &state.config.auth.cookie_name;
    if let Some(token) = session_token(&headers, cookie_name) {
        let conn = state.db.get()?;
        session::delete_session(&conn, token)?;
    }

    Ok((
        StatusCode::OK,
        AppendHeaders([(header::SET_COOKIE, clear_session_cookie(cookie_name))]),
        Json(json!({ "message": "Logged out successfully" })),
    )
        .into_response())
}

/// POST /api/auth/otp/verify
pub async fn verify_otp(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<VerifyOtpRequest>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let creds = users::credentials_by_id(&conn, &user.id)?.ok_or(AppError::NotFound)?;

    if creds.user.is_verified {
        return Ok(Json(json!({ "message": "Already verified", "user": creds.user })).into_response());
    }
    if !otp_matches(creds.otp.as_deref(), &req.pin) {
        return Err(AppError::BadRequest("Invalid OTP".into()));
    }

    users::mark_verified(&conn, &user.id)?;
    let user = users::find_by_id(&conn, &user.id)?.ok_or(AppError::NotFound)?;
    tracing::info!(user_id = %user.id, "User verified email");
    Ok(Json(json!({ "message": "OTP verified successfully", "user": user })).into_response())
}

/// POST /api/auth/otp/resend
pub async fn resend_otp(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Response> {
    if user.is_verified {
        return Err(AppError::BadRequest("Email is already verified".into()));
    }

    let otp = generate_otp();
    {
        let conn = state.db.get()?;
        users::set_otp(&conn, &user.id, &otp)?;
    }
    let mail = OtpEmail { otp: &otp }.to_mail(&user.email)?;
    state.mailer.send(mail).await?;

    Ok(Json(json!({ "message": "OTP sent to your email" })).into_response())
}

/// PUT /api/auth/profile
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<Response> {
    let name = req
        .new_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let password = req.new_password.as_deref().filter(|s| !s.trim().is_empty());

    if name.is_none() && password.is_none() {
        return Err(AppError::BadRequest("No data to update".into()));
    }
    if password.is_some_and(|p| p.len() < MIN_PASSWORD_LEN) {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let hash = password
        .map(hash_password)
        .transpose()
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let conn = state.db.get()?;
    users::update_profile(&conn, &user.id, name, hash.as_deref())?;
    let user = users::find_by_id(&conn, &user.id)?.ok_or(AppError::NotFound)?;

    Ok(Json(json!({ "message": "Profile updated successfully", "user": user })).into_response())
}

/// PUT /api/auth/avatar — multipart form with a single `image` file part.
pub async fn update_avatar(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let mut image = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        image = Some((file_name, bytes));
    }

    let (file_name, bytes) = match image {
        Some((name, bytes)) if !bytes.is_empty() => (name, bytes),
        _ => return Err(AppError::BadRequest("Avatar image is required".into())),
    };
    let avatar = store_image(&state, &file_name, &bytes).await?;

    let conn = state.db.get()?;
    users::set_avatar(&conn, &user.id, &avatar)?;
    let user = users::find_by_id(&conn, &user.id)?.ok_or(AppError::NotFound)?;
    tracing::info!(user_id = %user.id, %avatar, "Avatar updated");

    Ok(Json(json!({ "message": "Avatar updated successfully", "user": user })).into_response())
}

/// POST /api/auth/admin-request — forward a promotion request to the site owner.
pub async fn request_admin(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<AdminRequest>,
) -> AppResult<Response> {
    if user.is_admin {
        return Ok(Json(json!({ "message": "You are already an admin" })).into_response());
    }
    let reason = req.reason.trim();
    if reason.is_empty() {
        return Err(AppError::BadRequest("A reason is required".into()));
    }

    let mail = AdminRequestEmail {
        name: user.display_name(),
        email: &user.email,
        reason,
    }
    .to_mail(&state.config.mail.admin_address)?;
    state.mailer.send(mail).await?;
    tracing::info!(user_id = %user.id, "Admin access requested");

    Ok(Json(json!({ "message": "Request to become admin sent" })).into_response())
}
