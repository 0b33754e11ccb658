//! SQLite-backed book store.
//!
//! Uses `rusqlite` with the `bundled` feature so no system SQLite
//! library is required.  All methods are short synchronous statements
//! executed under a `Mutex`, so handlers call them directly; the guard
//! is released on every exit path.

use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::StoreError;

/// Current schema version. Bumped when migrations are added.
const SCHEMA_VERSION: i64 = 1;

/// A persisted book row.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Book {
    /// Server-assigned row id.
    pub id: i64,
    /// Book title.
    pub title: String,
    /// Book author.
    pub author: String,
    /// Public URL of the cover image in object storage.
    pub image_url: String,
    /// Subject identifier of the uploading user.
    pub user_id: String,
    /// Creation timestamp, RFC 3339 with millisecond precision.
    pub created_at: String,
}

/// Book store backed by a single SQLite database file.
pub struct BookStore {
    /// The database connection, guarded by a mutex for Send + Sync.
    conn: Mutex<Connection>,
}

impl BookStore {
    /// Open (or create) the database at `path` and initialize the schema.
    ///
    /// Passing `":memory:"` creates an in-memory database (useful for tests).
    pub fn new(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.apply_pragmas()?;
        store.init_db()?;
        Ok(store)
    }

    /// Apply recommended SQLite pragmas for performance and safety.
    fn apply_pragmas(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("mutex poisoned");
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )?;
        Ok(())
    }

    /// Create the required tables and indexes if they do not already exist.
    /// This is idempotent -- safe to call on every startup.
    fn init_db(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("mutex poisoned");
        conn.execute_batch(
            "
            -- Schema version tracking
            CREATE TABLE IF NOT EXISTS schema_version (
                version    INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );

            -- Books
            CREATE TABLE IF NOT EXISTS books (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                title      TEXT NOT NULL CHECK (length(title) BETWEEN 1 AND 255),
                author     TEXT NOT NULL CHECK (length(author) BETWEEN 1 AND 255),
                image_url  TEXT NOT NULL CHECK (length(image_url) BETWEEN 1 AND 500),
                user_id    TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_books_user_id
                ON books(user_id);
            ",
        )?;

        // Record schema version if not already present.
        let existing: Option<i64> = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get(0)
            })
            .optional()?
            .flatten();

        if existing.is_none() || existing.unwrap() < SCHEMA_VERSION {
            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version, applied_at) VALUES (?1, ?2)",
                params![SCHEMA_VERSION, now_rfc3339()],
            )?;
        }

        Ok(())
    }

    /// All books, newest first (ties broken by id, also newest first).
    pub fn list_books(&self) -> Result<Vec<Book>, StoreError> {
        let conn = self.conn.lock().expect("mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, title, author, image_url, user_id, created_at
             FROM books ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map([], row_to_book)?;
        let mut books = Vec::new();
        for row in rows {
            books.push(row?);
        }
        Ok(books)
    }

    /// Insert a book with a server-assigned id and creation timestamp.
    pub fn insert_book(
        &self,
        title: &str,
        author: &str,
        image_url: &str,
        user_id: &str,
    ) -> Result<Book, StoreError> {
        let conn = self.conn.lock().expect("mutex poisoned");
        let created_at = now_rfc3339();
        conn.execute(
            "INSERT INTO books (title, author, image_url, user_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![title, author, image_url, user_id, created_at],
        )?;
        let id = conn.last_insert_rowid();
        Ok(Book {
            id,
            title: title.to_string(),
            author: author.to_string(),
            image_url: image_url.to_string(),
            user_id: user_id.to_string(),
            created_at,
        })
    }

    /// Fetch a single book by id.
    pub fn get_book(&self, id: i64) -> Result<Option<Book>, StoreError> {
        let conn = self.conn.lock().expect("mutex poisoned");
        let book = conn
            .query_row(
                "SELECT id, title, author, image_url, user_id, created_at
                 FROM books WHERE id = ?1",
                params![id],
                row_to_book,
            )
            .optional()?;
        Ok(book)
    }

    /// Delete a book by id, returning the number of rows removed.
    ///
    /// Deleting a nonexistent id is not an error; it removes zero rows.
    pub fn delete_book(&self, id: i64) -> Result<usize, StoreError> {
        let conn = self.conn.lock().expect("mutex poisoned");
        let affected = conn.execute("DELETE FROM books WHERE id = ?1", params![id])?;
        Ok(affected)
    }

    /// Number of stored books.
    pub fn count_books(&self) -> Result<u64, StoreError> {
        let conn = self.conn.lock().expect("mutex poisoned");
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn row_to_book(row: &rusqlite::Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        image_url: row.get(3)?,
        user_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Current time as an RFC 3339 string (e.g. `2026-08-21T12:00:00.000Z`).
fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> BookStore {
        BookStore::new(":memory:").expect("failed to create in-memory store")
    }

    fn insert_sample(store: &BookStore, title: &str) -> Book {
        store
            .insert_book(
                title,
                "Test Author",
                "https://covers.example.com/sample.jpg",
                "user-1",
            )
            .expect("insert failed")
    }

    #[test]
    fn test_schema_idempotent() {
        let store = test_store();
        // Call init_db() again -- should not fail.
        store.init_db().expect("second init_db failed");
        store.init_db().expect("third init_db failed");
    }

    #[test]
    fn test_insert_and_list() {
        let store = test_store();
        let book = insert_sample(&store, "The Left Hand of Darkness");
        assert!(book.id > 0);
        assert!(book.created_at.ends_with('Z'));

        let books = store.list_books().unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0], book);
    }

    #[test]
    fn test_list_newest_first() {
        let store = test_store();
        let first = insert_sample(&store, "First");
        let second = insert_sample(&store, "Second");

        let books = store.list_books().unwrap();
        assert_eq!(books.len(), 2);
        // Same-millisecond inserts fall back to id ordering.
        assert_eq!(books[0].id, second.id);
        assert_eq!(books[1].id, first.id);
    }

    #[test]
    fn test_get_book() {
        let store = test_store();
        let book = insert_sample(&store, "Dune");

        let fetched = store.get_book(book.id).unwrap();
        assert_eq!(fetched, Some(book));
        assert_eq!(store.get_book(9999).unwrap(), None);
    }

    #[test]
    fn test_delete_idempotent() {
        let store = test_store();
        let book = insert_sample(&store, "To Delete");

        assert_eq!(store.delete_book(book.id).unwrap(), 1);
        assert_eq!(store.delete_book(book.id).unwrap(), 0);
        assert!(store.list_books().unwrap().is_empty());
    }

    #[test]
    fn test_count_tracks_inserts_and_deletes() {
        let store = test_store();
        assert_eq!(store.count_books().unwrap(), 0);

        let a = insert_sample(&store, "One");
        insert_sample(&store, "Two");
        assert_eq!(store.count_books().unwrap(), 2);

        store.delete_book(a.id).unwrap();
        assert_eq!(store.count_books().unwrap(), 1);
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let store = test_store();
        let first = insert_sample(&store, "First");
        store.delete_book(first.id).unwrap();

        let second = insert_sample(&store, "Second");
        assert!(second.id > first.id);
    }

    #[test]
    fn test_reopen_preserves_rows() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("books.db");
        let path = path.to_str().unwrap();

        let book = {
            let store = BookStore::new(path).expect("failed to create file-backed store");
            insert_sample(&store, "Persisted")
        };

        let reopened = BookStore::new(path).expect("failed to reopen store");
        assert_eq!(reopened.list_books().unwrap(), vec![book]);
    }

    #[test]
    fn test_empty_title_rejected() {
        let store = test_store();
        let err = store
            .insert_book("", "Author", "https://covers.example.com/x.jpg", "user-1")
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint { .. }));
    }

    #[test]
    fn test_overlong_image_url_rejected() {
        let store = test_store();
        let url = format!("https://covers.example.com/{}", "x".repeat(600));
        let err = store
            .insert_book("Title", "Author", &url, "user-1")
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint { .. }));
    }
}
