// dev-server/src/api/tx.rs
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use common::TrackTxRequest;

use crate::api::authenticate;
use crate::error::DevServerError;
use crate::registry::{GetTxStatus, TrackTx};
use crate::AppState;

#[post("/track")]
pub async fn track(
    req: HttpRequest,
    body: web::Json<TrackTxRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, DevServerError> {
    let caller = authenticate(&req, &state)?;
    let request = body.into_inner();
    if request.tx_id.trim().is_empty() {
        return Err(DevServerError::BadRequest("tx_id is required".to_string()));
    }

    tracing::debug!("{} registered {}", caller.address, request.tx_id);
    let status = state.registry.send(TrackTx(request)).await?;
    Ok(HttpResponse::Ok().json(status))
}

#[get("/track/{tx_id}")]
pub async fn get_status(
    req: HttpRequest,
    path: web::Path<(String,)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, DevServerError> {
    authenticate(&req, &state)?;
    let tx_id = path.into_inner().0;

    match state.registry.send(GetTxStatus { tx_id }).await? {
        Some(status) => Ok(HttpResponse::Ok().json(status)),
        None => Err(DevServerError::NotFound("tx not tracked".to_string())),
    }
}
