mod ack;
mod routes;
mod types;

use crate::http::routes::*;
use crate::relay::Relay;
use axum::http::{HeaderName, HeaderValue};
use axum::routing::{get, post};
use tower_http::set_header::SetResponseHeaderLayer;

#[cfg(feature = "sentry")]
use {
    sentry::integrations::tower::{NewSentryLayer, SentryHttpLayer},
    tower::ServiceBuilder,
    tracing::debug,
};

#[derive(Clone)]
pub struct HttpState {
    pub relay: Relay,
}

pub fn create_app(relay: Relay, _sentry: bool) -> axum::Router {
    let router = axum::Router::new()
        .route("/", get(health))
        .route("/events", post(slack_events))
        .route("/slack/events", post(slack_events))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-version"),
            HeaderValue::from_static(crate::VERSION),
        ));

    #[cfg(feature = "sentry")]
    let router = if _sentry {
        debug!("Adding Sentry HTTP layer!");
        router
            .layer(
                ServiceBuilder::new()
                    .layer(NewSentryLayer::<axum::http::Request<axum::body::Body>>::new_from_top()),
            )
            .layer(ServiceBuilder::new().layer(SentryHttpLayer::new().enable_transaction()))
    } else {
        router
    };

    router.with_state(HttpState { relay })
}
