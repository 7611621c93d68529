//! Learning Router

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};
use platform::pipeline::Mediator;
use platform::token::TokenIssuer;

use crate::presentation::handlers::{self, AppState};
use crate::presentation::middleware::{ContextState, attach_request_context, error_envelope};

/// Every learning route under `/api`, with the JSON error envelope applied
/// once around the whole tree (unmatched paths included)
pub fn learning_router(mediator: Mediator, tokens: Arc<TokenIssuer>) -> Router {
    let state = AppState { mediator };

    let auth = Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/me", get(handlers::me))
        .route(
            "/confirm-email",
            post(handlers::confirm_email).get(handlers::confirm_email_link),
        );

    let topic = Router::new()
        .route("/get-all", get(handlers::get_all_topics))
        .route("/get-by-id/{id}", get(handlers::get_topic_by_id))
        .route("/get-by-name/{name}", get(handlers::get_topic_by_name))
        .route("/create", post(handlers::create_topic))
        .route("/update", put(handlers::update_topic))
        .route("/delete/{id}", delete(handlers::delete_topic));

    let user = Router::new()
        .route("/get-all", get(handlers::get_all_users))
        .route("/get-by-id/{id}", get(handlers::get_user_by_id))
        .route("/update", put(handlers::update_user))
        .route("/delete/{id}", delete(handlers::delete_user));

    let user_activity = Router::new()
        .route("/get-by-user", get(handlers::get_user_activities))
        .route("/create", post(handlers::create_user_activity));

    let level = Router::new().route("/create", post(handlers::create_level));

    let lesson = Router::new()
        .route("/create", post(handlers::create_lesson))
        .route("/get-by-topic/{topicId}", get(handlers::get_lessons_by_topic));

    let api = Router::new()
        .nest("/auth", auth)
        .nest("/topic", topic)
        .nest("/user", user)
        .nest("/useractivity", user_activity)
        .nest("/level", level)
        .nest("/lesson", lesson)
        .with_state(state)
        .layer(middleware::from_fn_with_state(
            ContextState { tokens },
            attach_request_context,
        ));

    Router::new()
        .nest("/api", api)
        .layer(middleware::from_fn(error_envelope))
}
