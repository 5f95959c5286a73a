//! Per-card validation.
//!
//! [`ValidationOrchestrator`] checks cards against the backend and writes the
//! results into the [`CardStore`]. At most one check per card is in flight:
//! a caller that asks for a card already being checked awaits the outstanding
//! result instead of issuing a second request.
//!
//! Each check runs in its own task, so its side effects (store patch, bingo
//! notification, error report) happen exactly once no matter how many callers
//! wait on it, and it completes even if every caller gives up.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures_util::future::{join_all, BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::{DashboardApi, PositionRequest, PositionValidation};
use crate::error::{DashboardError, Result};
use crate::model::{matched_positions, CardId, CardStatus, CARD_SLOTS};
use crate::notify::{report, Notification, NotificationSink};
use crate::store::{CardStore, ViewStore};

type TicketResult = std::result::Result<ValidationOutcome, Arc<DashboardError>>;
type TicketFuture = Shared<BoxFuture<'static, TicketResult>>;

/// Result of one card check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub card_id: CardId,
    /// Status held by the store after the check.
    pub status: CardStatus,
    pub match_count: usize,
    /// The check moved the card into `Bingo`.
    pub entered_bingo: bool,
}

/// An outstanding check, as listed by [`ValidationOrchestrator::tickets`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationTicket {
    pub card_id: CardId,
    pub in_flight: bool,
}

/// Outcome of [`ValidationOrchestrator::validate_all_cards`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Cards whose check succeeded and was applied.
    pub validated: Vec<CardId>,
    /// Cards whose check failed, with the error text.
    pub failed: Vec<(CardId, String)>,
    /// Cards that entered `Bingo` during this batch.
    pub new_bingos: Vec<CardId>,
    /// Whether the aggregate stats refresh after the batch succeeded.
    pub stats_refreshed: bool,
}

/// Result of [`ValidationOrchestrator::reload_cards`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardLoad {
    /// Cards now in the store.
    pub loaded: usize,
    /// Cards dropped because their payload was malformed.
    pub skipped: Vec<CardId>,
    pub batch: BatchReport,
}

/// Deduplicating card checker. Cheap to clone; clones share tickets.
#[derive(Clone)]
pub struct ValidationOrchestrator {
    api: Arc<dyn DashboardApi>,
    cards: Arc<CardStore>,
    view: Arc<ViewStore>,
    sink: Arc<dyn NotificationSink>,
    tickets: Arc<Mutex<HashMap<CardId, TicketFuture>>>,
}

impl ValidationOrchestrator {
    pub fn new(
        api: Arc<dyn DashboardApi>,
        cards: Arc<CardStore>,
        view: Arc<ViewStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            api,
            cards,
            view,
            sink,
            tickets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Check one card and apply the result.
    ///
    /// Joins the outstanding check if one is in flight for `card_id`. A
    /// transition into `Bingo` emits one success notification; a card that
    /// was already `Bingo` emits none.
    ///
    /// # Errors
    ///
    /// The check's error, shared with every other caller of the same ticket
    /// and reported to the sink once.
    pub async fn validate_card(&self, card_id: &CardId) -> Result<ValidationOutcome> {
        let ticket = {
            let mut tickets = self.tickets.lock().await;
            match tickets.get(card_id) {
                Some(existing) => {
                    debug!(%card_id, "joining in-flight validation");
                    existing.clone()
                }
                None => {
                    let ticket = self.spawn_check(card_id.clone());
                    tickets.insert(card_id.clone(), ticket.clone());
                    ticket
                }
            }
        };
        ticket.await.map_err(DashboardError::Shared)
    }

    /// The ticket map lock is held by the caller, so the task's own removal
    /// cannot run before the ticket is inserted.
    fn spawn_check(&self, card_id: CardId) -> TicketFuture {
        let this = self.clone();
        let handle = tokio::spawn(async move {
            let result = this.check(&card_id).await;
            this.tickets.lock().await.remove(&card_id);
            if let Err(e) = &result {
                report(
                    this.sink.as_ref(),
                    &format!("Failed to validate card {card_id}"),
                    e,
                );
            }
            result.map_err(Arc::new)
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(join_err) => Err(Arc::new(DashboardError::TaskFailed(join_err.to_string()))),
            }
        }
        .boxed()
        .shared()
    }

    async fn check(&self, card_id: &CardId) -> Result<ValidationOutcome> {
        let check = self.api.check_card(card_id).await?;
        if let Some(echoed) = &check.card_id {
            if echoed != card_id {
                return Err(DashboardError::Protocol(format!(
                    "check for card {card_id} answered for card {echoed}"
                )));
            }
        }

        let status = check.card_status();
        let matched = matched_positions(card_id, &check.matches);
        let match_count = matched.len();
        let change = self.cards.patch(card_id, status, matched).await;
        let entered_bingo = change.is_some_and(|c| c.entered_bingo());
        if entered_bingo {
            announce_bingo(self.sink.as_ref(), card_id);
        }

        Ok(ValidationOutcome {
            card_id: card_id.clone(),
            status: change.map_or(status, |c| c.current),
            match_count,
            entered_bingo,
        })
    }

    /// Check every known card concurrently, then refresh the aggregate stats
    /// once.
    ///
    /// One card failing never keeps the others from being applied or the
    /// stats from being refreshed.
    pub async fn validate_all_cards(&self) -> BatchReport {
        let ids = self.cards.ids().await;
        debug!(cards = ids.len(), "validating all cards");
        let results = join_all(ids.iter().map(|id| self.validate_card(id))).await;

        let mut batch = BatchReport::default();
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(outcome) => {
                    if outcome.entered_bingo {
                        batch.new_bingos.push(id.clone());
                    }
                    batch.validated.push(id);
                }
                Err(e) => batch.failed.push((id, e.to_string())),
            }
        }

        batch.stats_refreshed = match self.refresh_stats().await {
            Ok(()) => true,
            Err(e) => {
                report(self.sink.as_ref(), "Failed to update game stats", &e);
                false
            }
        };

        if !batch.failed.is_empty() {
            warn!(
                failed = batch.failed.len(),
                validated = batch.validated.len(),
                "card batch validation finished with failures"
            );
        }
        batch
    }

    /// Explicit placement check for one position on a card.
    ///
    /// A valid placement shows a confirmation (a distinct one when it wins)
    /// and reloads the card store.
    ///
    /// # Errors
    ///
    /// [`DashboardError::InvalidInput`] for positions outside `0..25`; the
    /// request's error otherwise, after it has been reported.
    pub async fn validate_card_position(
        &self,
        card_id: &CardId,
        track_id: &str,
        position: u8,
    ) -> Result<PositionValidation> {
        if usize::from(position) >= CARD_SLOTS {
            return Err(DashboardError::InvalidInput(format!(
                "position {position} is outside the card (0..{CARD_SLOTS})"
            )));
        }

        let request = PositionRequest {
            card_id: card_id.clone(),
            track_id: track_id.to_string(),
            position,
        };
        let verdict = match self.api.validate_position(&request).await {
            Ok(verdict) => verdict,
            Err(e) => {
                report(self.sink.as_ref(), "Failed to validate position", &e);
                return Err(e);
            }
        };

        if !verdict.valid {
            debug!(%card_id, position, "position not valid");
            return Ok(verdict);
        }

        if verdict.has_bingo {
            info!(%card_id, "position check produced a bingo");
            self.sink
                .notify(Notification::success(format!("BINGO! Card {card_id} has won!")));
        } else {
            self.sink
                .notify(Notification::success("Position validated successfully"));
        }

        if let Err(e) = self.reload_cards().await {
            report(self.sink.as_ref(), "Failed to load cards", &e);
        }
        Ok(verdict)
    }

    /// Load the card store from the backend, replacing it wholesale, then
    /// validate every card.
    ///
    /// Malformed cards are skipped and reported; the rest still load.
    ///
    /// # Errors
    ///
    /// The fetch error. The store is left untouched in that case.
    pub async fn reload_cards(&self) -> Result<CardLoad> {
        let payloads = self.api.cards().await?;

        let mut views = Vec::with_capacity(payloads.len());
        let mut skipped = Vec::new();
        for (id, payload) in payloads {
            match payload.into_view(id.clone()) {
                Ok(view) => views.push(view),
                Err(e) => {
                    report(self.sink.as_ref(), &format!("Skipped card {id}"), &e);
                    skipped.push(id);
                }
            }
        }

        let replaced = self.cards.replace_all(views).await;
        debug!(loaded = replaced.loaded, skipped = skipped.len(), "card store replaced");
        for card_id in &replaced.entered_bingo {
            announce_bingo(self.sink.as_ref(), card_id);
        }
        let batch = self.validate_all_cards().await;
        Ok(CardLoad {
            loaded: replaced.loaded,
            skipped,
            batch,
        })
    }

    /// Fetch and apply the aggregate stats.
    ///
    /// # Errors
    ///
    /// The request's error, unreported.
    pub async fn refresh_stats(&self) -> Result<()> {
        let stats = self.api.dashboard_stats().await?;
        self.view.set_stats(stats).await;
        Ok(())
    }

    /// Returns `true` while a check for `card_id` is outstanding.
    pub async fn in_flight(&self, card_id: &CardId) -> bool {
        self.tickets.lock().await.contains_key(card_id)
    }

    /// Outstanding checks.
    pub async fn tickets(&self) -> Vec<ValidationTicket> {
        self.tickets
            .lock()
            .await
            .keys()
            .map(|card_id| ValidationTicket {
                card_id: card_id.clone(),
                in_flight: true,
            })
            .collect()
    }
}

/// The one success notification for a card moving into `Bingo`.
pub(crate) fn announce_bingo(sink: &dyn NotificationSink, card_id: &CardId) {
    info!(%card_id, "card reached bingo");
    sink.notify(Notification::success(format!("Card {card_id}: BINGO!")));
}

impl fmt::Debug for ValidationOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationOrchestrator").finish_non_exhaustive()
    }
}
