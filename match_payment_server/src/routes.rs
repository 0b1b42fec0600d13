//! Request handlers for the match payment server.
//!
//! Every match route is generic over the storage backend and the two collaborators, so the same handlers serve the
//! SQLite-backed production server and the endpoint tests. Keep the handlers thin: parse the request, call one
//! [`MatchFlowApi`] method, and let [`ServerError`] turn failures into responses.
//!
//! Handlers run on actix worker threads, so none of them may block. All I/O goes through the async API.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use match_payment_engine::{
    db_types::MatchId,
    traits::{MatchBackend, NotificationDelivery, PaymentCapture},
    MatchFlowApi,
};

use crate::{
    data_objects::{CancelRequest, CreateMatchRequest, ParticipantRequest, PaymentRequest},
    errors::ServerError,
};

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

type Api<B, N, P> = web::Data<MatchFlowApi<B, N, P>>;

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Matches  ----------------------------------------------------
route!(create_match => Post "/matches" impl MatchBackend, NotificationDelivery, PaymentCapture);
/// Registers a new match. It starts in free joining with no participants.
pub async fn create_match<B, N, P>(
    body: web::Json<CreateMatchRequest>,
    api: Api<B, N, P>,
) -> Result<HttpResponse, ServerError>
where
    B: MatchBackend,
    N: NotificationDelivery,
    P: PaymentCapture,
{
    let req = body.into_inner();
    debug!("💻️ Create match request for {}", req.match_id);
    let state = api.create_match(req.into()).await?;
    Ok(HttpResponse::Created().json(state))
}

route!(get_match => Get "/matches/{match_id}" impl MatchBackend, NotificationDelivery, PaymentCapture);
pub async fn get_match<B, N, P>(path: web::Path<MatchId>, api: Api<B, N, P>) -> Result<HttpResponse, ServerError>
where
    B: MatchBackend,
    N: NotificationDelivery,
    P: PaymentCapture,
{
    let match_id = path.into_inner();
    trace!("💻️ Fetching match {match_id}");
    let state = api.fetch_match(&match_id).await?;
    Ok(HttpResponse::Ok().json(state))
}

route!(stage_log => Get "/matches/{match_id}/stages" impl MatchBackend, NotificationDelivery, PaymentCapture);
/// The stage history of the match, oldest first.
pub async fn stage_log<B, N, P>(path: web::Path<MatchId>, api: Api<B, N, P>) -> Result<HttpResponse, ServerError>
where
    B: MatchBackend,
    N: NotificationDelivery,
    P: PaymentCapture,
{
    let match_id = path.into_inner();
    trace!("💻️ Fetching stage log for {match_id}");
    let log = api.fetch_stage_log(&match_id).await?;
    Ok(HttpResponse::Ok().json(log))
}

//----------------------------------------------   Participants  ----------------------------------------------------
route!(join_match => Post "/matches/{match_id}/join" impl MatchBackend, NotificationDelivery, PaymentCapture);
pub async fn join_match<B, N, P>(
    path: web::Path<MatchId>,
    body: web::Json<ParticipantRequest>,
    api: Api<B, N, P>,
) -> Result<HttpResponse, ServerError>
where
    B: MatchBackend,
    N: NotificationDelivery,
    P: PaymentCapture,
{
    let match_id = path.into_inner();
    let ParticipantRequest { user_id } = body.into_inner();
    debug!("💻️ {user_id} wants to join {match_id}");
    let state = api.on_participant_join(&match_id, user_id).await?;
    Ok(HttpResponse::Ok().json(state))
}

route!(leave_match => Post "/matches/{match_id}/leave" impl MatchBackend, NotificationDelivery, PaymentCapture);
pub async fn leave_match<B, N, P>(
    path: web::Path<MatchId>,
    body: web::Json<ParticipantRequest>,
    api: Api<B, N, P>,
) -> Result<HttpResponse, ServerError>
where
    B: MatchBackend,
    N: NotificationDelivery,
    P: PaymentCapture,
{
    let match_id = path.into_inner();
    let ParticipantRequest { user_id } = body.into_inner();
    debug!("💻️ {user_id} wants to leave {match_id}");
    let state = api.on_participant_leave(&match_id, &user_id).await?;
    Ok(HttpResponse::Ok().json(state))
}

route!(pay => Post "/matches/{match_id}/pay" impl MatchBackend, NotificationDelivery, PaymentCapture);
/// Takes a payment towards the participant's share. Clients that may retry the request should send an
/// `idempotency_key` so that the charge is only taken once.
pub async fn pay<B, N, P>(
    path: web::Path<MatchId>,
    body: web::Json<PaymentRequest>,
    api: Api<B, N, P>,
) -> Result<HttpResponse, ServerError>
where
    B: MatchBackend,
    N: NotificationDelivery,
    P: PaymentCapture,
{
    let match_id = path.into_inner();
    let PaymentRequest { user_id, amount, idempotency_key } = body.into_inner();
    debug!("💻️ Payment of {amount} from {user_id} for {match_id}");
    let state = api.on_payment_received_with_key(&match_id, &user_id, amount, idempotency_key).await?;
    Ok(HttpResponse::Ok().json(state))
}

//----------------------------------------------   Organizer  ----------------------------------------------------
route!(expire_window => Post "/matches/{match_id}/expire" impl MatchBackend, NotificationDelivery, PaymentCapture);
/// Closes the payment window now, if it has run out. The reminder sweep does this automatically; this route lets an
/// operator nudge a match along without waiting for the next sweep.
pub async fn expire_window<B, N, P>(path: web::Path<MatchId>, api: Api<B, N, P>) -> Result<HttpResponse, ServerError>
where
    B: MatchBackend,
    N: NotificationDelivery,
    P: PaymentCapture,
{
    let match_id = path.into_inner();
    debug!("💻️ Window expiry requested for {match_id}");
    let outcome = api.on_window_expired(&match_id).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

route!(confirm_match => Post "/matches/{match_id}/confirm" impl MatchBackend, NotificationDelivery, PaymentCapture);
pub async fn confirm_match<B, N, P>(path: web::Path<MatchId>, api: Api<B, N, P>) -> Result<HttpResponse, ServerError>
where
    B: MatchBackend,
    N: NotificationDelivery,
    P: PaymentCapture,
{
    let match_id = path.into_inner();
    info!("💻️ Organizer is confirming {match_id}");
    let result = api.on_confirm(&match_id).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(cancel_match => Post "/matches/{match_id}/cancel" impl MatchBackend, NotificationDelivery, PaymentCapture);
pub async fn cancel_match<B, N, P>(
    path: web::Path<MatchId>,
    body: web::Json<CancelRequest>,
    api: Api<B, N, P>,
) -> Result<HttpResponse, ServerError>
where
    B: MatchBackend,
    N: NotificationDelivery,
    P: PaymentCapture,
{
    let match_id = path.into_inner();
    let CancelRequest { reason } = body.into_inner();
    info!("💻️ Organizer is cancelling {match_id}: {reason}");
    let result = api.on_organizer_cancel(&match_id, &reason).await?;
    Ok(HttpResponse::Ok().json(result))
}
