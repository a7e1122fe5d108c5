use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use marketplace_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    traits::{MarketplaceDatabase, PaymentProvider},
    CheckoutApi,
    CheckoutUrls,
    IdentityApi,
    OrderLifecycleApi,
    PaymentReconciler,
    shared_database,
};
use stripe_tools::StripeApi;

use crate::{
    auth::TokenVerifier,
    config::{ServerConfig, ServerOptions, WebhookOptions},
    errors::ServerError,
    integrations::stripe::StripeGateway,
    routes::{
        health,
        CancelOrderRoute,
        CreateCheckoutSessionRoute,
        CreateOrderRoute,
        MyOrdersRoute,
        OrderByIdRoute,
        StripeWebhookRoute,
        UpdateOrderStatusRoute,
        VerifyPaymentRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = shared_database(&config.database_url, config.max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?
        .clone();
    let api = StripeApi::new(config.stripe.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = StripeGateway::new(api);
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, logging_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = create_server_instance(config, db, gateway, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Hooks that write every order event to the log.
pub fn logging_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_created(|ev| {
            Box::pin(async move {
                info!("📬️ Order {} created for user #{}. {}", ev.order.order_id, ev.order.user_id, ev.order.totals);
            })
        })
        .on_order_cancelled(|ev| {
            Box::pin(async move {
                info!(
                    "📬️ Order {} cancelled (was {}). Stock restored: {}",
                    ev.order.order_id, ev.previous_status, ev.stock_restored
                );
            })
        })
        .on_order_status_changed(|ev| {
            Box::pin(async move {
                info!("📬️ Order {} moved from {} to {}", ev.order.order_id, ev.old_status, ev.order.status);
            })
        });
    hooks
}

pub fn create_server_instance<B, P>(
    config: ServerConfig,
    db: B,
    provider: P,
    producers: EventProducers,
) -> Result<Server, ServerError>
where
    B: MarketplaceDatabase + Send + 'static,
    P: PaymentProvider + Clone + Send + 'static,
{
    let urls = CheckoutUrls::for_base_url(&config.public_url);
    info!("🪛️ Buyers will be sent back to {}", urls.success_url);
    let bind_addr = (config.host.clone(), config.port);
    let srv = HttpServer::new(move || {
        let identity_api = IdentityApi::new(db.clone());
        let checkout_api = CheckoutApi::new(db.clone(), provider.clone(), config.pricing, urls.clone());
        let reconciler = PaymentReconciler::new(db.clone(), provider.clone(), config.pricing, producers.clone())
            .with_retry_policy(config.provider_retry);
        let lifecycle_api = OrderLifecycleApi::new(db.clone(), producers.clone());
        let verifier = TokenVerifier::new(&config.auth);
        let options = ServerOptions::from_config(&config);
        let webhook = WebhookOptions::from_config(&config);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mkt::access_log"))
            .app_data(web::Data::new(identity_api))
            .app_data(web::Data::new(checkout_api))
            .app_data(web::Data::new(reconciler))
            .app_data(web::Data::new(lifecycle_api))
            .app_data(web::Data::new(verifier))
            .app_data(web::Data::new(options))
            .app_data(web::Data::new(webhook));
        // Routes that require authentication
        let api_scope = web::scope("/api")
            .service(CreateCheckoutSessionRoute::<B, P>::new())
            .service(VerifyPaymentRoute::<B, P>::new())
            .service(CreateOrderRoute::<B, P>::new())
            .service(MyOrdersRoute::<B>::new())
            .service(OrderByIdRoute::<B>::new())
            .service(CancelOrderRoute::<B>::new())
            .service(UpdateOrderStatusRoute::<B>::new());
        let webhook_scope = web::scope("/webhook").service(StripeWebhookRoute::<B, P>::new());
        app.service(health).service(api_scope).service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((bind_addr.0.as_str(), bind_addr.1))?
    .run();
    Ok(srv)
}
