//! Request handler definitions
//!
//! Each handler is a thin shim: it resolves the caller, hands the request to one of the engine components and maps the
//! result onto an HTTP response. Anything that touches the database or the payment provider is async, so a worker
//! thread is never parked on I/O while other requests wait.
//!
//! Handlers that are generic over the database or the provider cannot use the actix attribute macros directly, and
//! are registered through the `route!` macro below instead.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use log::*;
use marketplace_engine::{
    db_types::{OrderId, User},
    order_objects::{CheckoutRequest, DirectOrderRequest},
    traits::{IdentityStore, MarketplaceDatabase, PaymentProvider},
    CheckoutApi,
    IdentityApi,
    MarketplaceError,
    OrderLifecycleApi,
    PaymentReconciler,
};
use stripe_tools::{verify_webhook_signature, StripeEvent};

use crate::{
    auth::JwtClaims,
    config::{ServerOptions, WebhookOptions},
    data_objects::{CancelOrderParams, JsonResponse, StatusUpdateParams, VerifySessionParams, VerifyResponse},
    errors::ServerError,
    helpers::get_remote_ip,
};

pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";
const SESSION_COMPLETED_EVENTS: [&str; 2] =
    ["checkout.session.completed", "checkout.session.async_payment_succeeded"];

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

/// Turns the verified token claims into a user record. A valid token for a user that no longer exists is treated the
/// same as no token at all.
async fn caller<B: IdentityStore>(claims: &JwtClaims, identity: &IdentityApi<B>) -> Result<User, ServerError> {
    let user = identity.require_user(Some(&claims.credential())).await?;
    trace!("💻️ Request is from user #{}", user.id);
    Ok(user)
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Checkout  ----------------------------------------------------

route!(create_checkout_session => Post "/checkout/session" impl MarketplaceDatabase, PaymentProvider);
/// Route handler for the checkout session endpoint
///
/// Prices the cart from the catalog (whatever prices the client sent are ignored), checks stock, and opens a hosted
/// payment session with the provider. The response carries the session id and the URL the buyer must be sent to.
///
/// No stock is taken at this point. Stock is reserved when the payment is verified.
pub async fn create_checkout_session<B, P>(
    claims: JwtClaims,
    identity: web::Data<IdentityApi<B>>,
    api: web::Data<CheckoutApi<B, P>>,
    body: web::Json<CheckoutRequest>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    P: PaymentProvider,
{
    let user = caller(&claims, identity.as_ref()).await?;
    debug!("💻️ POST checkout session for user #{} with {} lines", user.id, body.items.len());
    let handle = api.create_checkout_session(Some(&user), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(handle))
}

route!(verify_payment => Post "/checkout/verify" impl MarketplaceDatabase, PaymentProvider);
/// Route handler for the payment verification endpoint
///
/// The storefront calls this when the buyer lands back on the success page. The session is checked with the provider
/// and, if it has been paid, turned into an order. Calling this more than once for the same session is harmless: the
/// original order is returned with `already_processed` set.
pub async fn verify_payment<B, P>(
    claims: JwtClaims,
    identity: web::Data<IdentityApi<B>>,
    api: web::Data<PaymentReconciler<B, P>>,
    body: web::Json<VerifySessionParams>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    P: PaymentProvider,
{
    let user = caller(&claims, identity.as_ref()).await?;
    let VerifySessionParams { session_id } = body.into_inner();
    debug!("💻️ POST verify session {session_id} for user #{}", user.id);
    let result = api.reconcile(Some(&user), &session_id).await?;
    Ok(HttpResponse::Ok().json(VerifyResponse::from(result)))
}

//----------------------------------------------   Orders  ----------------------------------------------------

route!(create_order => Post "/orders" impl MarketplaceDatabase, PaymentProvider);
/// Route handler for direct orders, i.e. those paid from a wallet or by bank transfer. Card payments are
/// rejected here; they go through checkout.
pub async fn create_order<B, P>(
    claims: JwtClaims,
    identity: web::Data<IdentityApi<B>>,
    api: web::Data<PaymentReconciler<B, P>>,
    body: web::Json<DirectOrderRequest>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    P: PaymentProvider,
{
    let user = caller(&claims, identity.as_ref()).await?;
    debug!("💻️ POST direct order for user #{} ({})", user.id, body.payment_method);
    let result = api.create_direct_order(Some(&user), body.into_inner()).await?;
    Ok(HttpResponse::Created().json(result.order))
}

route!(my_orders => Get "/orders" impl MarketplaceDatabase);
/// Route handler for the order history endpoint. Returns the caller's orders, newest first.
pub async fn my_orders<B: MarketplaceDatabase>(
    claims: JwtClaims,
    identity: web::Data<IdentityApi<B>>,
    api: web::Data<OrderLifecycleApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user = caller(&claims, identity.as_ref()).await?;
    debug!("💻️ GET orders for user #{}", user.id);
    let orders = api.orders_for_user(Some(&user)).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_by_id => Get "/orders/{order_id}" impl MarketplaceDatabase);
pub async fn order_by_id<B: MarketplaceDatabase>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    identity: web::Data<IdentityApi<B>>,
    api: web::Data<OrderLifecycleApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user = caller(&claims, identity.as_ref()).await?;
    let order_id = path.into_inner();
    debug!("💻️ GET order {order_id} for user #{}", user.id);
    let order = api.order_for_user(Some(&user), &order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(cancel_order => Post "/orders/{order_id}/cancel" impl MarketplaceDatabase);
/// Route handler for buyer cancellations. The body is optional; `{"reason": "..."}` records why.
pub async fn cancel_order<B: MarketplaceDatabase>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    identity: web::Data<IdentityApi<B>>,
    api: web::Data<OrderLifecycleApi<B>>,
    body: Option<web::Json<CancelOrderParams>>,
) -> Result<HttpResponse, ServerError> {
    let user = caller(&claims, identity.as_ref()).await?;
    let order_id = path.into_inner();
    let reason = body.and_then(|b| b.into_inner().reason);
    debug!("💻️ POST cancel order {order_id} for user #{}", user.id);
    let order = api.cancel(Some(&user), &order_id, reason).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(update_order_status => Post "/orders/{order_id}/status" impl MarketplaceDatabase);
/// Route handler for sellers moving an order along the fulfilment path.
pub async fn update_order_status<B: MarketplaceDatabase>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    identity: web::Data<IdentityApi<B>>,
    api: web::Data<OrderLifecycleApi<B>>,
    body: web::Json<StatusUpdateParams>,
) -> Result<HttpResponse, ServerError> {
    let user = caller(&claims, identity.as_ref()).await?;
    let order_id = path.into_inner();
    let StatusUpdateParams { status } = body.into_inner();
    debug!("💻️ POST status {status} for order {order_id} by user #{}", user.id);
    let order = api.advance_status(Some(&user), &order_id, status).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Webhooks  ----------------------------------------------------

route!(stripe_webhook => Post "/stripe" impl MarketplaceDatabase, PaymentProvider);
/// Route handler for Stripe webhook deliveries.
///
/// Every delivery must carry a valid `Stripe-Signature` header; unsigned or badly signed requests get a 400.
/// Completed checkout sessions are reconciled exactly as if the buyer had come back to the success page, so a buyer
/// who closes the tab after paying still gets their order. Once the signature checks out, business outcomes (an order
/// created or already present, stock sold out, an unpaid session) get a 200. A 503 is returned when the session could
/// not be verified with Stripe or the database failed, so that Stripe delivers the event again later.
pub async fn stripe_webhook<B, P>(
    req: HttpRequest,
    body: web::Bytes,
    options: web::Data<ServerOptions>,
    webhook: web::Data<WebhookOptions>,
    api: web::Data<PaymentReconciler<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    P: PaymentProvider,
{
    let peer = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "an unknown address".into());
    trace!("💻️ Received Stripe webhook delivery from {peer}");
    let signature = req
        .headers()
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServerError::InvalidWebhookSignature(format!("Missing {STRIPE_SIGNATURE_HEADER} header")))?;
    verify_webhook_signature(
        body.as_ref(),
        signature,
        webhook.signing_secret.reveal(),
        webhook.tolerance_secs,
        Utc::now().timestamp(),
    )
    .map_err(|e| {
        warn!("💻️ Rejected a Stripe webhook delivery from {peer}. {e}");
        ServerError::InvalidWebhookSignature(e.to_string())
    })?;
    let event = serde_json::from_slice::<StripeEvent>(body.as_ref())
        .map_err(|e| ServerError::InvalidRequestBody(format!("Not a Stripe event. {e}")))?;
    if !SESSION_COMPLETED_EVENTS.contains(&event.event_type.as_str()) {
        debug!("💻️ Ignoring Stripe event {} of type {}", event.id, event.event_type);
        return Ok(HttpResponse::Ok().json(JsonResponse::success("Event ignored")));
    }
    let Some(session_id) = event.data.object.get("id").and_then(|v| v.as_str()) else {
        warn!("💻️ Stripe event {} did not contain a checkout session id", event.id);
        return Ok(HttpResponse::Ok().json(JsonResponse::failure("No checkout session in event")));
    };
    info!("💻️ Stripe reports checkout session {session_id} as complete (event {})", event.id);
    let response = match api.reconcile_notified_session(session_id).await {
        Ok(result) if result.already_processed => {
            JsonResponse::success(format!("Order {} already exists", result.order_id()))
        },
        Ok(result) => JsonResponse::success(format!("Order {} created", result.order_id())),
        // Stripe redelivers on a 5xx, which is what we want while the provider or the database is unreachable
        Err(e @ (MarketplaceError::PaymentVerificationFailed(_) | MarketplaceError::DatabaseError(_))) => {
            error!("💻️ Could not reconcile session {session_id} from webhook event {}. Stripe will retry. {e}", event.id);
            return Ok(HttpResponse::ServiceUnavailable().json(JsonResponse::failure(e)));
        },
        Err(e) => {
            warn!("💻️ Could not reconcile session {session_id} from webhook event {}. {e}", event.id);
            JsonResponse::failure(e)
        },
    };
    Ok(HttpResponse::Ok().json(response))
}
