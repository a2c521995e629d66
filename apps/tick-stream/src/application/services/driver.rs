//! Session Driver
//!
//! Orchestrates one streaming session: reset the ledger, reconstruct the
//! backlog, flush it to early subscribers, then poll for live ticks until
//! the session closes. Runs once per process lifetime; the HTTP layer
//! keeps serving the final backlog after the driver finishes.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::application::ports::{Clock, QuoteSource};
use crate::application::services::backfill::{self, BackfillSettings};
use crate::application::services::poller::{self, PollerSettings};
use crate::domain::session::session_window;
use crate::infrastructure::broadcast::SharedTickHub;

/// Orchestrates backfill and live polling for one trading session.
pub struct SessionDriver {
    source: Arc<dyn QuoteSource>,
    clock: Arc<dyn Clock>,
    hub: SharedTickHub,
    backfill: BackfillSettings,
    poller: PollerSettings,
    cancel: CancellationToken,
}

impl SessionDriver {
    /// Create a driver over the given source, clock, and hub.
    #[must_use]
    pub fn new(
        source: Arc<dyn QuoteSource>,
        clock: Arc<dyn Clock>,
        hub: SharedTickHub,
        backfill: BackfillSettings,
        poller: PollerSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            clock,
            hub,
            backfill,
            poller,
            cancel,
        }
    }

    /// Run one full session cycle to completion.
    pub async fn run(self) {
        let window = session_window(self.clock.now());
        tracing::info!(
            symbol = %self.backfill.symbol,
            trading_day = %window.trading_day,
            open = %window.open,
            close = %window.close,
            "Session starting"
        );

        self.hub.reset();
        let loaded =
            backfill::run(self.source.as_ref(), self.clock.as_ref(), &self.hub, &self.backfill)
                .await;

        if window.is_closed_at(self.clock.now()) {
            tracing::info!(ticks = loaded, "Session already closed, serving backlog only");
            return;
        }

        let live = poller::run(
            self.source.as_ref(),
            self.clock.as_ref(),
            &self.hub,
            &window,
            &self.poller,
            self.cancel,
        )
        .await;

        tracing::info!(
            backlog = loaded,
            live,
            total = self.hub.backlog_len(),
            "Session complete"
        );
    }
}
