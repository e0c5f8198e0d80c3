use crate::error::AppError;
use crate::state::AppState;
use axum::extract::State;
use axum::response::Html;

pub async fn home(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let mut ctx = tera::Context::new();
    ctx.insert("active_tab", "process");
    ctx.insert("ai_configured", &state.openai.is_configured());
    let html = state.tera.render("index.html", &ctx)?;
    Ok(Html(html))
}

pub async fn logs(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let report = state.operations.list_all(&state.pricing)?;

    let mut ctx = tera::Context::new();
    ctx.insert(
        "logs",
        &report
            .operations
            .iter()
            .map(|op| {
                serde_json::json!({
                    "id": op.id,
                    "created_at": op.created_at,
                    "original_filename": op.original_filename,
                    "result_filename": op.result_filename,
                    "effect": op.effect,
                    "ai_description": op.ai_description,
                    "tokens_in": op.tokens_in,
                    "tokens_out": op.tokens_out,
                    "model": op.model,
                    "cost": format!("{:.4}", op.cost),
                })
            })
            .collect::<Vec<_>>(),
    );
    ctx.insert("total_cost", &format!("{:.4}", report.total_cost));
    let html = state.tera.render("logs.html", &ctx)?;
    Ok(Html(html))
}
