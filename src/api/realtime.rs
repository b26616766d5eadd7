use std::{convert::Infallible, time::Duration};

use crate::{
    auth::auth::AuthUser,
    error::AppError,
    utils::realtime::{
        RealtimeEvent, RealtimeHub, Subscription, announcements_topic, attendance_topic,
        notifications_topic,
    },
};
use actix_web::{
    HttpResponse,
    rt::time::{Instant, interval_at},
    web::{self, Bytes},
};
use futures::stream::{self, Stream, StreamExt};
use tracing::debug;

const HEARTBEAT: Duration = Duration::from_secs(25);

fn sse_frame(event: &RealtimeEvent) -> Bytes {
    Bytes::from(format!("event: {}\ndata: {}\n\n", event.event, event.payload))
}

/// Events of one subscription interleaved with comment heartbeats.
/// The subscription lives inside the stream, so a disconnect unsubscribes.
fn event_stream(subscription: Subscription) -> impl Stream<Item = Result<Bytes, Infallible>> {
    let events = stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.recv().await?;
        Some((sse_frame(&event), subscription))
    });

    let ticker = interval_at(Instant::now() + HEARTBEAT, HEARTBEAT);
    let heartbeats = stream::unfold(ticker, |mut ticker| async move {
        ticker.tick().await;
        Some((Bytes::from_static(b": keep-alive\n\n"), ticker))
    });

    let opening = stream::once(async { Bytes::from_static(b": connected\n\n") });

    // stop when the event side ends, otherwise the heartbeat would keep it open
    let closing = stream::once(async { None });
    let live = stream::select(events.map(Some).chain(closing), heartbeats.map(Some));

    opening
        .map(Some)
        .chain(live)
        .take_while(|frame| futures::future::ready(frame.is_some()))
        .filter_map(futures::future::ready)
        .map(Ok)
}

fn sse_response(hub: &RealtimeHub, topic: &str) -> HttpResponse {
    let subscription = hub.subscribe(topic);
    debug!(
        topic = subscription.topic(),
        listeners = hub.listener_count(topic),
        "Realtime stream opened"
    );

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(event_stream(subscription))
}

/// Live notifications for the caller
#[utoipa::path(
    get,
    path = "/api/realtime/notifications",
    responses((status = 200, description = "text/event-stream of `notification` events")),
    security(("bearer_auth" = [])),
    tag = "Realtime"
)]
pub async fn stream_notifications(
    auth: AuthUser,
    hub: web::Data<RealtimeHub>,
) -> Result<HttpResponse, AppError> {
    Ok(sse_response(&hub, &notifications_topic(&auth.user_id)))
}

/// Live announcements for the caller's school
#[utoipa::path(
    get,
    path = "/api/realtime/announcements",
    responses((status = 200, description = "text/event-stream of `announcement` events")),
    security(("bearer_auth" = [])),
    tag = "Realtime"
)]
pub async fn stream_announcements(
    auth: AuthUser,
    hub: web::Data<RealtimeHub>,
) -> Result<HttpResponse, AppError> {
    Ok(sse_response(&hub, &announcements_topic(auth.school_id()?)))
}

/// Live attendance changes for the caller's school
#[utoipa::path(
    get,
    path = "/api/realtime/attendance",
    responses(
        (status = 200, description = "text/event-stream of check-in, check-out and status events"),
        (status = 403, description = "Staff only")
    ),
    security(("bearer_auth" = [])),
    tag = "Realtime"
)]
pub async fn stream_attendance(
    auth: AuthUser,
    hub: web::Data<RealtimeHub>,
) -> Result<HttpResponse, AppError> {
    auth.require_staff()?;
    Ok(sse_response(&hub, &attendance_topic(auth.school_id()?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn frames_event_as_sse() {
        let frame = sse_frame(&RealtimeEvent::new("notification", json!({"title": "Nilai baru"})));
        assert_eq!(
            frame,
            Bytes::from("event: notification\ndata: {\"title\":\"Nilai baru\"}\n\n")
        );
    }

    #[actix_web::test]
    async fn stream_delivers_events_and_unsubscribes_on_drop() {
        let hub = RealtimeHub::new();
        let mut stream = Box::pin(event_stream(hub.subscribe("notifications:p1")));

        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            Bytes::from_static(b": connected\n\n")
        );

        hub.publish("notifications:p1", RealtimeEvent::new("notification", json!(1)));
        let frame = stream.next().await.unwrap().unwrap();
        assert!(frame.starts_with(b"event: notification"));

        assert_eq!(hub.listener_count("notifications:p1"), 1);
        drop(stream);
        assert_eq!(hub.topic_count(), 0);
    }
}
