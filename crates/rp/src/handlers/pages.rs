use axum::response::Html;

use crate::templates;

/// Handler for the login page (GET /).
#[axum::debug_handler]
pub async fn index() -> Html<String> {
    Html(templates::login_page())
}
