use std::sync::Arc;

use futures_lite::StreamExt;
use lapin::options::BasicAckOptions;

use hanok_shared::types::event::{payloads, routing_keys, Event};

use crate::AppState;

/// Listen for signup events (admin.signup_requested, resident.signup_requested).
pub async fn listen_signup_events(state: Arc<AppState>) -> anyhow::Result<()> {
    let mut consumer = state.rabbitmq.subscribe(
        "hanok-notification.signup",
        &[
            routing_keys::AUTH_ADMIN_SIGNUP_REQUESTED,
            routing_keys::AUTH_RESIDENT_SIGNUP_REQUESTED,
        ],
    ).await?;

    tracing::info!("listening for signup events");

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                let routing_key = delivery.routing_key.to_string();

                if routing_key == routing_keys::AUTH_ADMIN_SIGNUP_REQUESTED {
                    match serde_json::from_slice::<Event<payloads::AdminSignupRequested>>(&delivery.data) {
                        Ok(event) => {
                            tracing::info!(
                                applicant = %event.data.applicant_name,
                                "received admin.signup_requested event"
                            );
                            state.dispatcher.admin_signup_requested(&event.data.applicant_name).await;
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "failed to deserialize admin.signup_requested event");
                        }
                    }
                } else if routing_key == routing_keys::AUTH_RESIDENT_SIGNUP_REQUESTED {
                    match serde_json::from_slice::<Event<payloads::ResidentSignupRequested>>(&delivery.data) {
                        Ok(event) => {
                            tracing::info!(
                                resident_id = %event.data.resident_id,
                                "received resident.signup_requested event"
                            );
                            state.dispatcher
                                .resident_signup_requested(event.data.resident_id, &event.data.applicant_name)
                                .await;
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "failed to deserialize resident.signup_requested event");
                        }
                    }
                }

                // Ack regardless: the business action already committed and
                // must not be redelivered on notification failure.
                let _ = delivery.ack(BasicAckOptions::default()).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "signup consumer error");
            }
        }
    }

    Ok(())
}

/// Listen for complaint events (complaint.created, complaint.status_changed).
pub async fn listen_complaint_events(state: Arc<AppState>) -> anyhow::Result<()> {
    let mut consumer = state.rabbitmq.subscribe(
        "hanok-notification.complaint",
        &[
            routing_keys::COMPLAINT_CREATED,
            routing_keys::COMPLAINT_STATUS_CHANGED,
        ],
    ).await?;

    tracing::info!("listening for complaint events");

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                let routing_key = delivery.routing_key.to_string();

                if routing_key == routing_keys::COMPLAINT_CREATED {
                    match serde_json::from_slice::<Event<payloads::ComplaintCreated>>(&delivery.data) {
                        Ok(event) => {
                            tracing::info!(
                                complaint_id = %event.data.complaint_id,
                                "received complaint.created event"
                            );
                            state.dispatcher
                                .complaint_created(event.data.complaint_id, &event.data.title)
                                .await;
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "failed to deserialize complaint.created event");
                        }
                    }
                } else if routing_key == routing_keys::COMPLAINT_STATUS_CHANGED {
                    match serde_json::from_slice::<Event<payloads::ComplaintStatusChanged>>(&delivery.data) {
                        Ok(event) => {
                            tracing::info!(
                                complaint_id = %event.data.complaint_id,
                                status = %event.data.status,
                                "received complaint.status_changed event"
                            );
                            state.dispatcher
                                .complaint_status_changed(event.data.complaint_id, &event.data.status)
                                .await;
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "failed to deserialize complaint.status_changed event");
                        }
                    }
                }

                let _ = delivery.ack(BasicAckOptions::default()).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "complaint consumer error");
            }
        }
    }

    Ok(())
}

/// Listen for publication events (notice.created, poll.created).
pub async fn listen_publication_events(state: Arc<AppState>) -> anyhow::Result<()> {
    let mut consumer = state.rabbitmq.subscribe(
        "hanok-notification.publication",
        &[
            routing_keys::NOTICE_CREATED,
            routing_keys::POLL_CREATED,
        ],
    ).await?;

    tracing::info!("listening for publication events");

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                let routing_key = delivery.routing_key.to_string();

                if routing_key == routing_keys::NOTICE_CREATED {
                    match serde_json::from_slice::<Event<payloads::NoticeCreated>>(&delivery.data) {
                        Ok(event) => {
                            tracing::info!(
                                notice_id = %event.data.notice_id,
                                apartment_id = %event.data.apartment_id,
                                "received notice.created event"
                            );
                            state.dispatcher
                                .notice_created(event.data.apartment_id, &event.data.title)
                                .await;
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "failed to deserialize notice.created event");
                        }
                    }
                } else if routing_key == routing_keys::POLL_CREATED {
                    match serde_json::from_slice::<Event<payloads::PollCreated>>(&delivery.data) {
                        Ok(event) => {
                            tracing::info!(
                                poll_id = %event.data.poll_id,
                                apartment_id = %event.data.apartment_id,
                                "received poll.created event"
                            );
                            state.dispatcher
                                .poll_created(event.data.apartment_id, &event.data.title)
                                .await;
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "failed to deserialize poll.created event");
                        }
                    }
                }

                let _ = delivery.ack(BasicAckOptions::default()).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "publication consumer error");
            }
        }
    }

    Ok(())
}
