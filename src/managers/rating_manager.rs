use poise::serenity_prelude::MessageId;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::state::{
    Partition, RatingAggregate, RatingMessageIndex, RatingRequest, SharedRecordStore,
    SubmittedRatings,
};

/// Result of offering a rating for a rating-request message
#[derive(Debug, Clone, PartialEq)]
pub enum RatingSubmission {
    Accepted {
        stars: u8,
        /// Aggregate right after this rating was counted
        ratings: RatingAggregate,
        /// What the message was sent for, if known
        request: Option<RatingRequest>,
    },
    /// The message was already answered; nothing changed
    AlreadySubmitted { prior: u8 },
    /// Outside 1-5; nothing changed
    Invalid { stars: u8 },
}

/// An answered rating request whose message should show its read-only form
#[derive(Debug, Clone, PartialEq)]
pub struct AnsweredRequest {
    pub message_id: MessageId,
    pub request: RatingRequest,
    pub stars: u8,
}

#[derive(Debug, Default)]
struct RatingBook {
    aggregate: RatingAggregate,
    submitted: SubmittedRatings,
    messages: RatingMessageIndex,
}

/// Owns the rating aggregate and both message indexes
pub struct RatingManager {
    store: SharedRecordStore,
    book: Mutex<RatingBook>,
}

impl RatingManager {
    pub async fn load(store: SharedRecordStore) -> Self {
        let mut aggregate: RatingAggregate = store.load_or_default(Partition::Ratings).await;
        let submitted: SubmittedRatings = store.load_or_default(Partition::SubmittedRatings).await;
        let messages = store.load_or_default(Partition::RatingMessages).await;

        if aggregate.normalize() {
            warn!("Rating totals did not match their history, rebuilt from history");
            if let Err(e) = store.save(Partition::Ratings, &aggregate).await {
                error!("Failed to save repaired ratings: {}", e);
            }
        }
        info!(
            "Loaded {} ratings, {} answered rating requests",
            aggregate.count,
            submitted.len()
        );

        Self {
            store,
            book: Mutex::new(RatingBook {
                aggregate,
                submitted,
                messages,
            }),
        }
    }

    /// Count `stars` for `message_id` unless that message was already answered
    pub async fn submit(&self, message_id: MessageId, stars: u8) -> RatingSubmission {
        let mut book = self.book.lock().await;

        if let Some(prior) = book.submitted.get(message_id) {
            info!(
                "Rating message {} already answered with {}, ignoring {}",
                message_id, prior, stars
            );
            return RatingSubmission::AlreadySubmitted { prior };
        }

        if let Err(e) = book.aggregate.add(stars) {
            warn!("Rejected rating for message {}: {}", message_id, e);
            return RatingSubmission::Invalid { stars };
        }
        book.submitted.insert(message_id, stars);

        if let Err(e) = self.store.save(Partition::Ratings, &book.aggregate).await {
            error!("Failed to save ratings: {}", e);
        }
        if let Err(e) = self.store.save(Partition::SubmittedRatings, &book.submitted).await {
            error!("Failed to save submitted ratings: {}", e);
        }

        RatingSubmission::Accepted {
            stars,
            ratings: book.aggregate.clone(),
            request: book.messages.get(message_id).cloned(),
        }
    }

    /// Remember who a dispatched rating request belongs to
    pub async fn record_request(&self, message_id: MessageId, request: RatingRequest) {
        let mut book = self.book.lock().await;
        book.messages.insert(message_id, request);
        if let Err(e) = self.store.save(Partition::RatingMessages, &book.messages).await {
            error!("Failed to save rating message index: {}", e);
        }
    }

    pub async fn aggregate(&self) -> RatingAggregate {
        self.book.lock().await.aggregate.clone()
    }

    pub async fn request(&self, message_id: MessageId) -> Option<RatingRequest> {
        self.book.lock().await.messages.get(message_id).cloned()
    }

    /// Dispatched requests that have also been answered
    pub async fn answered_requests(&self) -> Vec<AnsweredRequest> {
        let book = self.book.lock().await;
        book.messages
            .iter()
            .filter_map(|(message_id, request)| {
                book.submitted.get(message_id).map(|stars| AnsweredRequest {
                    message_id,
                    request: request.clone(),
                    stars,
                })
            })
            .collect()
    }
}

pub type SharedRatingManager = Arc<RatingManager>;

pub async fn create_shared_rating_manager(store: SharedRecordStore) -> SharedRatingManager {
    Arc::new(RatingManager::load(store).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::create_shared_record_store;
    use poise::serenity_prelude::UserId;

    async fn manager() -> (tempfile::TempDir, RatingManager) {
        let dir = tempfile::tempdir().unwrap();
        let store = create_shared_record_store(dir.path());
        let manager = RatingManager::load(store).await;
        (dir, manager)
    }

    #[tokio::test]
    async fn test_aggregate_matches_history() {
        let (_dir, manager) = manager().await;
        for (i, stars) in [5u8, 3, 4, 1, 5, 2].iter().enumerate() {
            let outcome = manager.submit(MessageId::new(100 + i as u64), *stars).await;
            assert!(matches!(outcome, RatingSubmission::Accepted { .. }));
        }
        let aggregate = manager.aggregate().await;
        assert_eq!(aggregate.total, 20);
        assert_eq!(aggregate.count, 6);
        assert_eq!(aggregate.ratings, vec![5, 3, 4, 1, 5, 2]);
        assert!(aggregate.is_consistent());
    }

    #[tokio::test]
    async fn test_second_submission_keeps_first() {
        let (_dir, manager) = manager().await;
        let message = MessageId::new(42);

        manager.submit(message, 4).await;
        let second = manager.submit(message, 1).await;
        assert_eq!(second, RatingSubmission::AlreadySubmitted { prior: 4 });

        let aggregate = manager.aggregate().await;
        assert_eq!((aggregate.total, aggregate.count), (4, 1));
    }

    #[tokio::test]
    async fn test_out_of_range_is_not_counted() {
        let (_dir, manager) = manager().await;
        let message = MessageId::new(42);
        assert_eq!(manager.submit(message, 0).await, RatingSubmission::Invalid { stars: 0 });
        assert_eq!(manager.submit(message, 6).await, RatingSubmission::Invalid { stars: 6 });
        assert_eq!(manager.aggregate().await.count, 0);

        // The message can still be answered properly
        assert!(matches!(
            manager.submit(message, 5).await,
            RatingSubmission::Accepted { stars: 5, .. }
        ));
    }

    #[tokio::test]
    async fn test_state_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_shared_record_store(dir.path());
        {
            let manager = RatingManager::load(store.clone()).await;
            manager
                .record_request(
                    MessageId::new(9),
                    RatingRequest::new(UserId::new(1), None, Some("ticket-bob".into())),
                )
                .await;
            manager
                .record_request(
                    MessageId::new(10),
                    RatingRequest::new(UserId::new(2), None, None),
                )
                .await;
            manager.submit(MessageId::new(9), 3).await;
        }

        let manager = RatingManager::load(store).await;
        assert_eq!(manager.aggregate().await.total, 3);
        assert_eq!(
            manager.submit(MessageId::new(9), 5).await,
            RatingSubmission::AlreadySubmitted { prior: 3 }
        );

        let answered = manager.answered_requests().await;
        assert_eq!(answered.len(), 1);
        assert_eq!(answered[0].message_id, MessageId::new(9));
        assert_eq!(answered[0].stars, 3);
        assert_eq!(answered[0].request.ticket_name.as_deref(), Some("ticket-bob"));
    }

    #[tokio::test]
    async fn test_accepted_carries_request() {
        let (_dir, manager) = manager().await;
        let request = RatingRequest::new(UserId::new(1), None, Some("ticket-amy".into()));
        manager.record_request(MessageId::new(5), request.clone()).await;

        match manager.submit(MessageId::new(5), 4).await {
            RatingSubmission::Accepted {
                request: Some(r), ..
            } => assert_eq!(r, request),
            other => panic!("unexpected {:?}", other),
        }
    }
}
