// lexroute-lambda/src/main.rs

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use lexroute_core::{
    ConfigError, FulfillmentRouter, LexEvent, LexResponse, LiteLlmClient, ResponseConfig,
    RouterConfig, UnconfiguredProxy,
};
use serde_json::Value;
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;

/// Optional path to a TOML config bundled with the function.
const CONFIG_PATH_ENV: &str = "LEXROUTE_CONFIG";

fn init_logging() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // CloudWatch stamps every line itself.
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter)
        .with_current_span(true)
        .with_target(false)
        .without_time()
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

/// Builds the router once per cold start.
///
/// A bad configuration is logged as fatal but does not stop the function: the
/// router is wired to an [`UnconfiguredProxy`] so every turn still gets the
/// fallback reply until the deployment is fixed.
fn build_router(config: Result<RouterConfig, ConfigError>) -> FulfillmentRouter {
    let built = config.map_err(|e| e.to_string()).and_then(|config| {
        LiteLlmClient::new(&config.proxy)
            .map(|client| (config.responses, client))
            .map_err(|e| e.to_string())
    });

    match built {
        Ok((responses, client)) => {
            info!(
                url = client.url(),
                canned_intents = responses.intents.len(),
                "Fulfillment router ready."
            );
            FulfillmentRouter::new(responses, Arc::new(client))
        }
        Err(reason) => {
            error!(
                error_kind = "configuration_error",
                error = %reason,
                "FATAL: router configuration is invalid; every turn will receive the fallback message."
            );
            FulfillmentRouter::new(
                ResponseConfig::default(),
                Arc::new(UnconfiguredProxy::new(reason)),
            )
        }
    }
}

/// Handles one Lex invocation. Always returns a Lex reply, even for events
/// that do not deserialize.
async fn handle_event(
    router: &FulfillmentRouter,
    event: LambdaEvent<Value>,
) -> Result<LexResponse, Error> {
    let (payload, context) = event.into_parts();
    let span = info_span!("invocation", request_id = %context.request_id);

    let lex_event = match serde_json::from_value::<LexEvent>(payload) {
        Ok(event) => event,
        Err(e) => {
            span.in_scope(|| {
                warn!(error = %e, "Lex event did not match the V2 shape; treating as an empty fallback turn.")
            });
            LexEvent::default()
        }
    };

    Ok(router.handle_lex(lex_event).instrument(span).await)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();
    init_logging()?;

    let config_path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
    let router = build_router(RouterConfig::load(config_path.as_deref()));
    let router = &router;

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        handle_event(router, event).await
    }))
    .await
}
