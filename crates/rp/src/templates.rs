//! HTML pages served by the relying party.
//!
//! The pages are deliberately bare: end-to-end tests identify them by their
//! `<title>`.

/// Escape HTML special characters to prevent XSS.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>{title}</title>
</head>
<body>
{body}
</body>
</html>"#
    )
}

/// Login form posting `email` to `/auth`.
pub fn login_page() -> String {
    page(
        "RP: Login",
        r#"    <form method="post" action="/auth">
        <input name="email" type="email">
    </form>"#,
    )
}

/// Shown when authentication could not be started. Carries no detail.
pub fn error_page() -> String {
    page("RP: Error", "")
}

pub fn got_error_page() -> String {
    page("RP: Got error", "")
}

pub fn invalid_token_page() -> String {
    page("RP: Invalid token", "")
}

pub fn confirmed_page(identity: &str) -> String {
    page(
        "RP: Confirmed",
        &format!("    <p>{}</p>", html_escape(identity)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_page_posts_email_to_auth() {
        let html = login_page();
        assert!(html.contains("<title>RP: Login</title>"));
        assert!(html.contains(r#"action="/auth""#));
        assert!(html.contains(r#"name="email""#));
    }

    #[test]
    fn confirmed_page_escapes_identity() {
        let html = confirmed_page("<b>x</b>@example.com");
        assert!(html.contains("<p>&lt;b&gt;x&lt;/b&gt;@example.com</p>"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn error_page_is_generic() {
        assert_eq!(error_page().matches("<p>").count(), 0);
        assert!(error_page().contains("<title>RP: Error</title>"));
    }
}
