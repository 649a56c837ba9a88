use std::{net::SocketAddr, sync::Arc};

use axum::{Json, Router, extract::State, routing::post};
use chrono::Utc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::{
    departures::client::BoardClient,
    skill::{RequestEnvelope, ResponseEnvelope, Skill},
    stops::store::FileStore,
};

pub type AppSkill = Skill<FileStore, BoardClient>;

async fn handle_request(
    State(skill): State<Arc<AppSkill>>,
    Json(envelope): Json<RequestEnvelope>,
) -> Json<ResponseEnvelope> {
    Json(skill.handle(&envelope, Utc::now()).await)
}

pub fn router(skill: Arc<AppSkill>) -> Router {
    Router::new()
        .route("/", post(handle_request))
        .layer(CorsLayer::permissive())
        .with_state(skill)
}

pub async fn serve(skill: Arc<AppSkill>, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router(skill)).await?;
    Ok(())
}
