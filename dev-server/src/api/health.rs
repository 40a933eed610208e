// dev-server/src/api/health.rs
use actix_web::{get, web, HttpResponse};
use chrono::Utc;
use common::{ComponentHealth, ComponentStatus, HealthResponse, SystemHealthResponse};
use std::collections::BTreeMap;

use crate::error::DevServerError;
use crate::registry::GetRegistryStats;
use crate::AppState;

const SERVICE_NAME: &str = "algocampus-bff";

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        service: Some(SERVICE_NAME.to_string()),
    })
}

#[get("/system/health")]
pub async fn system_health(state: web::Data<AppState>) -> Result<HttpResponse, DevServerError> {
    let stats = state.registry.send(GetRegistryStats).await?;
    let uptime = Utc::now().signed_duration_since(state.started_at).num_seconds();

    let mut components = BTreeMap::new();
    components.insert(
        "registry".to_string(),
        ComponentHealth {
            status: ComponentStatus::Ok,
            detail: format!(
                "{} pending challenges, {} tracked transactions ({} confirmed), {} sign-ins",
                stats.pending_challenges, stats.tracked_transactions, stats.confirmed_transactions, stats.sign_ins
            ),
        },
    );
    components.insert(
        "chain".to_string(),
        ComponentHealth {
            status: ComponentStatus::Degraded,
            detail: "simulated: transactions confirm after a fixed number of status reads".to_string(),
        },
    );
    components.insert(
        "server".to_string(),
        ComponentHealth {
            status: ComponentStatus::Ok,
            detail: format!("up {}s", uptime),
        },
    );

    let status = if components.values().all(|c| c.status == ComponentStatus::Ok) {
        ComponentStatus::Ok
    } else {
        ComponentStatus::Degraded
    };

    Ok(HttpResponse::Ok().json(SystemHealthResponse {
        status,
        service: SERVICE_NAME.to_string(),
        components,
    }))
}
