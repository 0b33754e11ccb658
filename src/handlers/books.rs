//! Book listing, upload, and delete handlers.

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use garde::Validate;
use tower_sessions::Session;
use tracing::debug;

use crate::db::Book;
use crate::errors::ApiError;
use crate::handlers::auth::current_user;
use crate::metrics::{
    BOOKS_DELETED_TOTAL, BOOKS_TOTAL, BOOKS_UPLOADED_TOTAL, COVER_UPLOAD_BYTES_TOTAL,
};
use crate::pages;
use crate::AppState;

/// User id recorded on uploads when the auth gate is disabled.
const ANONYMOUS_USER: &str = "anonymous";

// -- Form validation -----------------------------------------------------------

/// Text fields of the upload form, validated after trimming.
#[derive(Debug, Validate)]
pub struct BookForm {
    /// Book title, 1-255 characters.
    #[garde(length(min = 1, max = 255))]
    pub title: String,
    /// Author name, 1-255 characters.
    #[garde(length(min = 1, max = 255))]
    pub author: String,
}

impl BookForm {
    /// Build a form from raw field values, trimming surrounding
    /// whitespace before validation.
    pub fn from_fields(title: &str, author: &str) -> Result<Self, ApiError> {
        let form = BookForm {
            title: title.trim().to_string(),
            author: author.trim().to_string(),
        };
        form.validate().map_err(|report| ApiError::Validation {
            message: report.to_string(),
        })?;
        Ok(form)
    }
}

fn missing(field: &str) -> ApiError {
    ApiError::MissingField {
        field: field.to_string(),
    }
}

// -- Handlers ------------------------------------------------------------------

/// `GET /` -- Browser-facing index page.
///
/// Greets the signed-in user (with upload form and logout link) or
/// offers a sign-in link, then lists the books newest first.
#[utoipa::path(
    get,
    path = "/",
    tag = "Books",
    operation_id = "Index",
    responses(
        (status = 200, description = "HTML index page"),
        (status = 500, description = "Database failure")
    )
)]
pub async fn index(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Response, ApiError> {
    let user = current_user(&session).await?;
    let user_label = user
        .as_ref()
        .map(|claims| claims.email.as_deref().unwrap_or(&claims.sub));

    let books = state.store.list_books()?;
    let page = pages::render_index(&state.settings.server.app_name, user_label, &books);
    Ok(Html(page).into_response())
}

/// `GET /books` -- JSON list of all books, newest first.
#[utoipa::path(
    get,
    path = "/books",
    tag = "Books",
    operation_id = "ListBooks",
    responses(
        (status = 200, description = "All books, newest first", body = [Book]),
        (status = 500, description = "Database failure")
    )
)]
pub async fn list_books(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let books = state.store.list_books()?;
    Ok(Json(books).into_response())
}

/// `POST /upload` -- Multipart upload of a new book with cover image.
///
/// Fields: `title`, `author`, and the file field `image`; any absent
/// yields 400 before anything is written. The cover is stored first and
/// the row inserted second, so a failed insert leaves at most one
/// orphan object, which is removed again best-effort.
#[utoipa::path(
    post,
    path = "/upload",
    tag = "Books",
    operation_id = "UploadBook",
    request_body(content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Book created"),
        (status = 400, description = "Missing or invalid form fields"),
        (status = 401, description = "Authentication required"),
        (status = 500, description = "Cover upload or row insert failed")
    )
)]
pub async fn upload_book(
    State(state): State<Arc<AppState>>,
    session: Session,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let user_id = match current_user(&session).await? {
        Some(claims) => claims.sub,
        None => ANONYMOUS_USER.to_string(),
    };

    let mut title: Option<String> = None;
    let mut author: Option<String> = None;
    let mut image: Option<(String, String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => title = Some(field.text().await?),
            "author" => author = Some(field.text().await?),
            "image" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or("image/jpeg").to_string();
                let data = field.bytes().await?;
                image = Some((filename, content_type, data));
            }
            _ => {}
        }
    }

    let title = title.ok_or_else(|| missing("title"))?;
    let author = author.ok_or_else(|| missing("author"))?;
    let (filename, content_type, data) = image.ok_or_else(|| missing("image"))?;
    // Browsers submit an empty file part when no file was chosen.
    if filename.is_empty() {
        return Err(missing("image"));
    }

    let form = BookForm::from_fields(&title, &author)?;

    let size = data.len() as u64;
    let image_url = state.covers.upload(data, &filename, &content_type).await?;

    let book = match state
        .store
        .insert_book(&form.title, &form.author, &image_url, &user_id)
    {
        Ok(book) => book,
        Err(err) => {
            // The row never landed; remove the cover again so no orphan
            // object lingers in the store.
            let removed = state.covers.delete(&image_url).await;
            state
                .logger
                .error(&format!(
                    "insert failed after cover upload {image_url} (compensating delete {}): {err}",
                    if removed { "ok" } else { "failed" }
                ))
                .await;
            return Err(err.into());
        }
    };

    metrics::counter!(BOOKS_UPLOADED_TOTAL).increment(1);
    metrics::counter!(COVER_UPLOAD_BYTES_TOTAL).increment(size);
    metrics::gauge!(BOOKS_TOTAL).increment(1.0);

    debug!(id = book.id, "book uploaded");
    state
        .logger
        .info(&format!(
            "user {user_id} uploaded \"{}\" by {} (book {})",
            book.title, book.author, book.id
        ))
        .await;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "message": format!("uploaded \"{}\"", book.title),
            "book": book,
        })),
    )
        .into_response())
}

/// `DELETE /books/{id}` -- Remove a book and its stored cover.
///
/// Idempotent: deleting an id that never existed (or was already
/// removed) still returns 200. The cover delete is best-effort; the row
/// goes away regardless.
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "Books",
    operation_id = "DeleteBook",
    params(("id" = i64, Path, description = "Book id")),
    responses(
        (status = 200, description = "Book deleted (or already absent)"),
        (status = 401, description = "Authentication required"),
        (status = 500, description = "Database failure")
    )
)]
pub async fn delete_book(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    if let Some(book) = state.store.get_book(id)? {
        if !state.covers.delete(&book.image_url).await {
            state
                .logger
                .error(&format!(
                    "cover delete failed for book {id} ({})",
                    book.image_url
                ))
                .await;
        }
        let removed = state.store.delete_book(id)?;
        if removed > 0 {
            metrics::counter!(BOOKS_DELETED_TOTAL).increment(1);
            metrics::gauge!(BOOKS_TOTAL).decrement(1.0);
        }
        state
            .logger
            .info(&format!("book {id} (\"{}\") deleted", book.title))
            .await;
    }

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "message": format!("book {id} deleted"),
        })),
    )
        .into_response())
}

// -- Tests ---------------------------------------------------------------------
