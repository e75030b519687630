use crate::extractors::HalContext;
use crate::hal;
use crate::response::{hal_ok, HalResponse};
use crate::state::AppState;
use axum::extract::State;

/// `GET /`: links to every collection.
pub async fn index(State(state): State<AppState>, ctx: HalContext) -> HalResponse {
    hal_ok(ctx.media_type, hal::root(&ctx.links, &state.model))
}
