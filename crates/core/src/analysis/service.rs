//! Search → sanitize → analyze as one operation

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tixlens_common::resilience::{Clock, SystemClock};
use tixlens_domain::{AnalysisReport, SearchCriteria, Ticket};
use tracing::{info, instrument};

use super::engine::AnalysisEngine;
use crate::sanitize::Sanitizer;
use crate::ticketing::{ResilientServiceClient, ServiceResult, TicketRemote};

/// Runs the full reporting pipeline against one client
pub struct TicketAnalysisService<R: TicketRemote, C: Clock = SystemClock> {
    client: Arc<ResilientServiceClient<R, C>>,
    sanitizer: Sanitizer,
    engine: AnalysisEngine,
}

impl<R: TicketRemote, C: Clock> TicketAnalysisService<R, C> {
    pub fn new(
        client: Arc<ResilientServiceClient<R, C>>,
        sanitizer: Sanitizer,
        engine: AnalysisEngine,
    ) -> Self {
        Self { client, sanitizer, engine }
    }

    pub fn client(&self) -> &Arc<ResilientServiceClient<R, C>> {
        &self.client
    }

    pub fn engine(&self) -> &AnalysisEngine {
        &self.engine
    }

    /// Search once and analyze the sanitized results
    #[instrument(skip_all)]
    pub async fn run(&self, criteria: &SearchCriteria) -> ServiceResult<AnalysisReport> {
        let tickets = self.client.search_tickets(criteria).await?;
        Ok(self.analyze(tickets))
    }

    /// Search each resolver group concurrently and analyze the union.
    ///
    /// The per-group searches share the client's pool, so at most
    /// `pool_size` run at once. Tickets returned for more than one group are
    /// counted once. With no groups this is [`run`](Self::run). The first
    /// failing group (in `groups` order) fails the whole run.
    #[instrument(skip_all, fields(groups = groups.len()))]
    pub async fn run_for_groups(
        &self,
        criteria: &SearchCriteria,
        groups: &[String],
    ) -> ServiceResult<AnalysisReport> {
        let mut seen_groups = HashSet::new();
        let unique_groups: Vec<&str> = groups
            .iter()
            .map(|group| group.trim())
            .filter(|group| !group.is_empty() && seen_groups.insert(*group))
            .collect();
        if unique_groups.is_empty() {
            return self.run(criteria).await;
        }

        let searches = unique_groups.iter().map(|group| {
            let scoped = criteria.for_group(*group);
            let client = Arc::clone(&self.client);
            async move { client.search_tickets(&scoped).await }
        });
        let results = join_all(searches).await;

        let mut seen_ids = HashSet::new();
        let mut merged = Vec::new();
        for result in results {
            for ticket in result? {
                if seen_ids.insert(ticket.id.clone()) {
                    merged.push(ticket);
                }
            }
        }
        Ok(self.analyze(merged))
    }

    fn analyze(&self, tickets: Vec<Ticket>) -> AnalysisReport {
        let (sanitized, redactions) = self.sanitizer.sanitize_all(tickets);
        let result = self.engine.analyze(&sanitized);
        info!(
            tickets = result.ticket_count,
            redactions,
            failed_calculators = result.errors.len(),
            "Analysis report ready"
        );
        AnalysisReport { result, redactions }
    }
}
