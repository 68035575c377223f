use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use common::agent::QueryPipeline;
use common::store::StoreResolver;
use common::ScribeError;
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::auth::AuthService;

/// shared application state handed to every handler
pub struct AppState {
    pub pipeline: Arc<QueryPipeline>,
    pub resolver: StoreResolver,
    pub auth: Arc<AuthService>,
}

#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateDbForm {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryForm {
    pub nl_query: String,
    pub db_name: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/signup", web::post().to(signup))
        .route("/login", web::post().to(login))
        .route("/upload_db", web::post().to(upload_db))
        .route("/create_db", web::post().to(create_db))
        .route("/databases", web::get().to(list_databases))
        .route("/query", web::post().to(query))
        .route("/healthcheck", web::get().to(healthcheck));
}

async fn healthcheck() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn signup(form: web::Form<CredentialsForm>, state: web::Data<AppState>) -> impl Responder {
    tracing::debug!(username = %form.username, "signup attempt");

    match state.auth.create_user(&form.username, &form.password).await {
        Ok(true) => HttpResponse::Ok().json(json!({"msg": "User created"})),
        Ok(false) => HttpResponse::BadRequest()
            .json(json!({"detail": "User already exists or creation failed"})),
        Err(e) => {
            tracing::error!("signup failed: {}", e);
            HttpResponse::InternalServerError().json(json!({"detail": "Signup failed"}))
        }
    }
}

async fn login(form: web::Form<CredentialsForm>, state: web::Data<AppState>) -> impl Responder {
    tracing::debug!(username = %form.username, "login attempt");

    match state.auth.authenticate(&form.username, &form.password).await {
        Ok(true) => match state.auth.create_access_token(&form.username) {
            Ok(access_token) => HttpResponse::Ok().json(TokenResponse {
                access_token,
                token_type: "bearer".to_string(),
            }),
            Err(e) => {
                tracing::error!("token issue failed: {}", e);
                HttpResponse::InternalServerError().json(json!({"detail": "Login failed"}))
            }
        },
        Ok(false) => HttpResponse::Ok().json(json!({"error": "Invalid credentials"})),
        Err(e) => {
            tracing::error!("login failed: {}", e);
            HttpResponse::InternalServerError().json(json!({"detail": "Login failed"}))
        }
    }
}

// bearer-token gate shared by every data endpoint
fn authorize(req: &HttpRequest, auth: &AuthService) -> Result<String, HttpResponse> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let Some(token) = token else {
        return Err(HttpResponse::Unauthorized().json(json!({"detail": "Invalid token"})));
    };

    auth.verify_token(token)
        .map_err(|_| HttpResponse::Unauthorized().json(json!({"detail": "Invalid token"})))
}

async fn upload_db(
    req: HttpRequest,
    mut payload: Multipart,
    state: web::Data<AppState>,
) -> impl Responder {
    let username = match authorize(&req, &state.auth) {
        Ok(username) => username,
        Err(resp) => return resp,
    };

    let mut saved: Option<String> = None;

    while let Ok(Some(mut field)) = payload.try_next().await {
        let Some(filename) = field
            .content_disposition()
            .get_filename()
            .map(|name| name.to_string())
        else {
            continue;
        };

        if !filename.ends_with(".db") {
            return HttpResponse::BadRequest()
                .json(json!({"detail": "Only .db files are allowed"}));
        }

        let path = match state.resolver.resolve(&username, &filename) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("upload rejected: {}", e);
                return HttpResponse::BadRequest().json(json!({"detail": "Invalid database name"}));
            }
        };

        let mut bytes = web::BytesMut::new();
        while let Ok(Some(chunk)) = field.try_next().await {
            bytes.extend_from_slice(&chunk);
        }

        if let Err(e) = std::fs::write(&path, &bytes) {
            tracing::error!("upload write failed: {}", e);
            return HttpResponse::InternalServerError()
                .json(json!({"detail": format!("Failed to upload database: {}", e)}));
        }

        tracing::info!(tenant = %username, db = %filename, size = bytes.len(), "database uploaded");
        saved = Some(filename);
    }

    match saved {
        Some(db_name) => {
            HttpResponse::Ok().json(json!({"msg": "Database uploaded", "db_name": db_name}))
        }
        None => HttpResponse::BadRequest().json(json!({"detail": "No file provided"})),
    }
}

async fn create_db(
    req: HttpRequest,
    form: web::Form<CreateDbForm>,
    state: web::Data<AppState>,
) -> impl Responder {
    let username = match authorize(&req, &state.auth) {
        Ok(username) => username,
        Err(resp) => return resp,
    };

    let name = form.name.trim();
    if name.is_empty() {
        return HttpResponse::BadRequest().json(json!({"detail": "Database name cannot be empty"}));
    }

    let db_name = format!("{}.db", name);
    let path = match state.resolver.resolve(&username, &db_name) {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!("create rejected: {}", e);
            return HttpResponse::BadRequest().json(json!({"detail": "Invalid database name"}));
        }
    };

    // opening the path is enough to materialize an empty store in the
    // engine's native format
    match rusqlite::Connection::open(&path) {
        Ok(_) => {
            tracing::info!(tenant = %username, db = %db_name, "database created");
            HttpResponse::Ok().json(json!({"msg": "Database created", "db_name": db_name}))
        }
        Err(e) => {
            tracing::error!("create failed: {}", e);
            HttpResponse::InternalServerError()
                .json(json!({"detail": format!("Failed to create database: {}", e)}))
        }
    }
}

async fn list_databases(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    let username = match authorize(&req, &state.auth) {
        Ok(username) => username,
        Err(resp) => return resp,
    };

    match state.resolver.list(&username) {
        Ok(stores) => {
            let (uploaded, created): (Vec<_>, Vec<_>) =
                stores.into_iter().partition(|store| store.is_uploaded());
            HttpResponse::Ok().json(json!({"uploaded": uploaded, "created": created}))
        }
        Err(e) => {
            tracing::error!("listing failed: {}", e);
            HttpResponse::InternalServerError()
                .json(json!({"detail": format!("Failed to list databases: {}", e)}))
        }
    }
}

async fn query(
    req: HttpRequest,
    form: web::Form<QueryForm>,
    state: web::Data<AppState>,
) -> impl Responder {
    let username = match authorize(&req, &state.auth) {
        Ok(username) => username,
        Err(resp) => return resp,
    };

    if form.nl_query.trim().is_empty() {
        return HttpResponse::BadRequest().json(json!({"detail": "Query cannot be empty"}));
    }
    if form.db_name.trim().is_empty() {
        return HttpResponse::BadRequest().json(json!({"detail": "Database name cannot be empty"}));
    }

    match state.pipeline.run(&username, &form.db_name, &form.nl_query).await {
        Ok(outcome) => {
            HttpResponse::Ok().json(json!({"sql": outcome.sql, "results": outcome.results}))
        }
        Err(ScribeError::DatabaseNotFound(_)) => {
            HttpResponse::NotFound().json(json!({"detail": "Database not found"}))
        }
        Err(ScribeError::StoreName(_)) => {
            HttpResponse::BadRequest().json(json!({"detail": "Invalid database name"}))
        }
        Err(e) => {
            tracing::error!("query failed: {}", e);
            HttpResponse::InternalServerError()
                .json(json!({"detail": format!("Query execution failed: {}", e)}))
        }
    }
}
