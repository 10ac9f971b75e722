use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use std::sync::Arc;
use tera::Context;

use crate::state::AppState;

pub async fn index(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut ctx = Context::new();
    ctx.insert("modes", &["EN 53", "EN 73"]);
    render_page("certificate.html", ctx)
}

fn render_page(name: &str, ctx: Context) -> Html<String> {
    let tera = crate::templates::get_tera();
    let rendered = tera
        .render(name, &ctx)
        .unwrap_or_else(|_| format!("Template error: {}", name));
    Html(rendered)
}
