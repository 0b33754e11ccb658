//! HTML rendering for the browser-facing index page.
//!
//! The index is the only HTML surface; every other endpoint speaks
//! JSON. Pages are assembled as plain strings with explicit escaping.

use crate::db::Book;

// -- Escaping -----------------------------------------------------------------

/// Escape text for interpolation into element content and double-quoted
/// attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

// -- Index page ----------------------------------------------------------------

/// Upload form shown to signed-in visitors.
const UPLOAD_FORM: &str = "\
<form action=\"/upload\" method=\"post\" enctype=\"multipart/form-data\">
<input type=\"text\" name=\"title\" placeholder=\"Title\" required>
<input type=\"text\" name=\"author\" placeholder=\"Author\" required>
<input type=\"file\" name=\"image\" accept=\"image/*\" required>
<button type=\"submit\">Share book</button>
</form>
";

/// Render the index page: a greeting or sign-in link, the upload form
/// for signed-in visitors, and the current book list.
///
/// `user_label` is the signed-in user's display label (email when the
/// provider returned one); `None` renders the anonymous view.
pub fn render_index(app_name: &str, user_label: Option<&str>, books: &[Book]) -> String {
    let title = escape_html(app_name);
    let mut page = String::with_capacity(1024 + books.len() * 256);

    page.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    page.push_str(&format!("<title>{title}</title>\n"));
    page.push_str("</head>\n<body>\n");
    page.push_str(&format!("<h1>{title}</h1>\n"));

    match user_label {
        Some(label) => {
            page.push_str(&format!(
                "<p>Signed in as {}. <a href=\"/logout\">Log out</a></p>\n",
                escape_html(label)
            ));
            page.push_str(UPLOAD_FORM);
        }
        None => {
            page.push_str("<p><a href=\"/login\">Sign in</a> to share a book.</p>\n");
        }
    }

    page.push_str("<h2>Available books</h2>\n");
    if books.is_empty() {
        page.push_str("<p>No books yet.</p>\n");
    } else {
        page.push_str("<ul class=\"books\">\n");
        for book in books {
            page.push_str(&render_book_item(book));
        }
        page.push_str("</ul>\n");
    }

    page.push_str("</body>\n</html>\n");
    page
}

fn render_book_item(book: &Book) -> String {
    format!(
        "<li><img src=\"{}\" alt=\"cover\" width=\"96\"> <strong>{}</strong> by {}</li>\n",
        escape_html(&book.image_url),
        escape_html(&book.title),
        escape_html(&book.author),
    )
}

// -- Tests ---------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_book(title: &str, author: &str) -> Book {
        Book {
            id: 1,
            title: title.to_string(),
            author: author.to_string(),
            image_url: "https://covers.s3.us-east-1.amazonaws.com/abc.jpg".to_string(),
            user_id: "user-1".to_string(),
            created_at: "2025-06-01T12:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("plain"), "plain");
        assert_eq!(
            escape_html("<script>\"&'</script>"),
            "&lt;script&gt;&quot;&amp;&#39;&lt;/script&gt;"
        );
    }

    #[test]
    fn test_anonymous_view_links_to_login() {
        let page = render_index("BookSwap Cloud", None, &[]);
        assert!(page.contains("<h1>BookSwap Cloud</h1>"));
        assert!(page.contains("href=\"/login\""));
        assert!(!page.contains("href=\"/logout\""));
        assert!(!page.contains("<form"));
        assert!(page.contains("No books yet."));
    }

    #[test]
    fn test_signed_in_view_greets_and_offers_upload() {
        let page = render_index("BookSwap Cloud", Some("reader@example.com"), &[]);
        assert!(page.contains("Signed in as reader@example.com"));
        assert!(page.contains("href=\"/logout\""));
        assert!(page.contains("action=\"/upload\""));
        assert!(!page.contains("href=\"/login\""));
    }

    #[test]
    fn test_books_render_escaped() {
        let books = vec![make_book("Tom & Jerry <3", "A. <b>Author</b>")];
        let page = render_index("BookSwap", None, &books);
        assert!(page.contains("Tom &amp; Jerry &lt;3"));
        assert!(page.contains("A. &lt;b&gt;Author&lt;/b&gt;"));
        assert!(page.contains("src=\"https://covers.s3.us-east-1.amazonaws.com/abc.jpg\""));
        assert!(!page.contains("<b>Author</b>"));
    }
}
