//! # SuiGives Ingress
//!
//! HTTP API JSON untuk front end SuiGives.
//!
//! ## Architecture
//! ```text
//! Browser → Ingress ─┬─→ CampaignService → ReadPipeline → Sui full node
//!                    └─→ Database (SQLite mirror) ← Reconciler
//! ```
//!
//! ## Endpoints
//!
//! | Route | Akses |
//! |-------|-------|
//! | `GET /api/campaigns`, `GET /api/campaigns/:id` | publik |
//! | `POST /api/campaigns/:id/pending-donation` | publik |
//! | `GET /api/analytics` | publik |
//! | `POST /api/proposals` | publik |
//! | `GET/POST /api/user/profile` | publik / pemilik |
//! | `/api/admin/*` | allow-list admin |
//! | `GET /health`, `GET /metrics` | publik |

use axum::routing::{get, post};
use axum::Router;

pub mod admin;
pub mod auth;
pub mod campaigns;
pub mod error;
pub mod health;
pub mod public;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

/// Build the full router.
pub fn build_router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/users", get(admin::list_users).post(admin::recompute_users))
        .route("/donations", get(admin::list_donations).post(admin::import_donation))
        .route(
            "/proposals",
            get(admin::list_proposals)
                .post(admin::create_proposal)
                .patch(admin::review_proposal),
        )
        .route("/reconcile", post(admin::reconcile))
        .layer(axum::middleware::from_fn_with_state(state.clone(), auth::admin_guard));

    Router::new()
        .route("/api/campaigns", get(campaigns::list_campaigns))
        .route("/api/campaigns/:id", get(campaigns::get_campaign))
        .route("/api/campaigns/:id/pending-donation", post(campaigns::pending_donation))
        .route("/api/analytics", get(campaigns::analytics))
        .route("/api/proposals", post(public::submit_proposal))
        .route("/api/user/profile", get(public::get_profile).post(public::update_profile))
        .nest("/api/admin", admin)
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics_endpoint))
        .with_state(state)
}
