use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::config::DraftsConfig;
use crate::domain::draft::{DraftId, DraftSource, FormPayload, ServiceRequestDraft};
use crate::domain::request::{fields, RequestType};
use crate::drafts::{DraftError, DraftStore, SaveOutcome, SaveReport};
use crate::form::autosave::AutosaveDebounce;
use crate::form::definition::FormDefinition;
use crate::form::submission::{
    SubmissionGateway, SubmissionPayload, SubmissionReceipt, SubmitError,
};
use crate::journey::{JourneyError, JourneyStop, JourneyStopList, StopType};
use crate::pricing::PricingContext;
use crate::validation::{assemble_request, resolve_request_type, ValidationErrors};

const ACTOR: &str = "form-controller";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NavigationError {
    #[error("step {target} does not exist; the form has {len} steps")]
    OutOfRange { target: usize, len: usize },
    #[error("cannot skip from step {from} to step {target}")]
    SkipAhead { from: usize, target: usize },
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("field `{0}` is not part of this form")]
    UnknownField(String),
    #[error("journey stops can only be edited on a journey request")]
    NotJourney,
    #[error(transparent)]
    Journey(#[from] JourneyError),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub from: usize,
    pub to: usize,
    /// `None` when the autosave was skipped or failed; failures are logged.
    pub saved: Option<SaveReport>,
}

#[derive(Clone, Debug)]
struct DraftHandle {
    id: DraftId,
    created_at: Option<DateTime<Utc>>,
    revision: u64,
    persisted: bool,
}

/// Drives one multi-step request form: navigation gated by validation,
/// debounced autosave, and final submission.
pub struct FormController<G> {
    definition: FormDefinition,
    store: Arc<DraftStore>,
    gateway: G,
    payload: FormPayload,
    stops: JourneyStopList,
    current_step: usize,
    completed: BTreeSet<usize>,
    draft: DraftHandle,
    autosave: AutosaveDebounce,
    pricing: Option<PricingContext>,
    audit_sink: Option<Arc<dyn AuditSink>>,
    correlation_id: String,
}

impl<G> FormController<G>
where
    G: SubmissionGateway,
{
    pub fn new(definition: FormDefinition, store: Arc<DraftStore>, gateway: G) -> Self {
        Self::with_payload(definition, store, gateway, FormPayload::new())
    }

    pub fn with_payload(
        definition: FormDefinition,
        store: Arc<DraftStore>,
        gateway: G,
        payload: FormPayload,
    ) -> Self {
        let mut controller = Self {
            definition,
            store,
            gateway,
            payload,
            stops: JourneyStopList::new(),
            current_step: 0,
            completed: BTreeSet::new(),
            draft: DraftHandle {
                id: DraftId::generate(),
                created_at: None,
                revision: 0,
                persisted: false,
            },
            autosave: AutosaveDebounce::default(),
            pricing: None,
            audit_sink: None,
            correlation_id: uuid::Uuid::new_v4().to_string(),
        };
        controller.load_stops_from_payload();
        controller
    }

    /// Rebuilds a controller from a stored draft. Drafts that fail their
    /// integrity checks, or point past the last step, are reported as corrupt.
    pub async fn resume(
        definition: FormDefinition,
        store: Arc<DraftStore>,
        gateway: G,
        id: &DraftId,
    ) -> Result<Self, DraftError> {
        let draft = store.load(id).await?.ok_or_else(|| DraftError::NotFound(id.clone()))?;
        if draft.current_step >= definition.len() {
            return Err(DraftError::Corrupt {
                id: id.clone(),
                reason: format!(
                    "step {} is outside a {}-step form",
                    draft.current_step,
                    definition.len()
                ),
            });
        }

        let mut controller = Self::with_payload(definition, store, gateway, draft.payload);
        controller.current_step = draft.current_step;
        controller.completed = (0..draft.current_step).collect();
        controller.draft = DraftHandle {
            id: draft.id,
            created_at: Some(draft.created_at),
            revision: draft.revision,
            persisted: true,
        };

        tracing::info!(
            event_name = "form.resumed",
            draft_id = %controller.draft.id,
            step = controller.current_step,
            source = ?draft.source,
            "resumed form from draft"
        );
        Ok(controller)
    }

    pub fn with_pricing(mut self, pricing: PricingContext) -> Self {
        self.pricing = Some(pricing);
        self
    }

    pub fn with_autosave(mut self, autosave: AutosaveDebounce) -> Self {
        self.autosave = autosave;
        self
    }

    /// Applies the configured autosave quiet period.
    pub fn with_drafts_config(self, config: &DraftsConfig) -> Self {
        self.with_autosave(AutosaveDebounce::from_config(config))
    }

    pub fn with_audit_sink(
        mut self,
        sink: Arc<dyn AuditSink>,
        correlation_id: impl Into<String>,
    ) -> Self {
        self.audit_sink = Some(sink);
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn definition(&self) -> &FormDefinition {
        &self.definition
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn is_completed(&self, step: usize) -> bool {
        self.completed.contains(&step)
    }

    pub fn payload(&self) -> &FormPayload {
        &self.payload
    }

    pub fn stops(&self) -> &JourneyStopList {
        &self.stops
    }

    pub fn draft_id(&self) -> &DraftId {
        &self.draft.id
    }

    pub fn has_persisted_draft(&self) -> bool {
        self.draft.persisted
    }

    pub fn set_field(
        &mut self,
        field: &str,
        value: Value,
        now: DateTime<Utc>,
    ) -> Result<(), EditError> {
        if self.definition.owner_of(field).is_none() {
            return Err(EditError::UnknownField(field.to_owned()));
        }

        if value.is_null() {
            self.payload.remove(field);
        } else {
            self.payload.insert(field.to_owned(), value);
        }

        if field == fields::REQUEST_TYPE {
            self.apply_request_type();
        } else if field == fields::JOURNEY_STOPS {
            self.load_stops_from_payload();
        }

        self.autosave.record_edit(now);
        Ok(())
    }

    /// Runs `edit` against the stop list and mirrors the result into the
    /// payload. Only valid while the request type is `journey`.
    pub fn edit_stops<R, F>(&mut self, now: DateTime<Utc>, edit: F) -> Result<R, EditError>
    where
        F: FnOnce(&mut JourneyStopList) -> Result<R, JourneyError>,
    {
        if !self.stops.is_journey_mode() {
            return Err(EditError::NotJourney);
        }

        let result = edit(&mut self.stops);
        self.sync_stops_into_payload();
        self.autosave.record_edit(now);
        Ok(result?)
    }

    pub fn add_stop(
        &mut self,
        stop_type: StopType,
        position: Option<usize>,
        now: DateTime<Utc>,
    ) -> Result<usize, EditError> {
        self.edit_stops(now, |stops| stops.add_stop(stop_type, position))
    }

    pub fn remove_stop(&mut self, index: usize, now: DateTime<Utc>) -> Result<JourneyStop, EditError> {
        self.edit_stops(now, |stops| stops.remove_stop(index))
    }

    pub fn reorder_stop(
        &mut self,
        from: usize,
        to: usize,
        now: DateTime<Utc>,
    ) -> Result<(), EditError> {
        self.edit_stops(now, |stops| stops.reorder(from, to))
    }

    /// Validates the current step and moves forward on success. On the last
    /// step the position is unchanged but the step is still marked complete.
    pub async fn go_next(&mut self, now: DateTime<Utc>) -> Result<StepOutcome, ValidationErrors> {
        let from = self.current_step;
        if let Err(errors) = self.validate_current() {
            tracing::info!(
                event_name = "form.step_rejected",
                draft_id = %self.draft.id,
                step = from,
                invalid_fields = errors.errors.len(),
                "step validation failed"
            );
            self.audit("form.step_rejected", AuditCategory::Form, AuditOutcome::Rejected, |event| {
                event
                    .with_metadata("step", from.to_string())
                    .with_metadata("invalid_fields", errors.errors.len().to_string())
            });
            return Err(errors);
        }

        self.completed.insert(from);
        if from < self.definition.last_position() {
            self.current_step = from + 1;
        }
        let to = self.current_step;

        tracing::info!(
            event_name = "form.step_advanced",
            draft_id = %self.draft.id,
            from,
            to,
            "form step advanced"
        );
        self.audit("form.step_advanced", AuditCategory::Form, AuditOutcome::Success, |event| {
            event.with_metadata("from", from.to_string()).with_metadata("to", to.to_string())
        });

        let saved = match self.save_draft(now).await {
            Ok(report) => Some(report),
            Err(error) => {
                tracing::warn!(
                    event_name = "draft.autosave_failed",
                    draft_id = %self.draft.id,
                    error = %error,
                    "autosave after step advance failed"
                );
                None
            }
        };

        Ok(StepOutcome { from, to, saved })
    }

    /// Moves one step back; a no-op on the first step.
    pub fn go_back(&mut self) -> usize {
        if self.current_step > 0 {
            self.current_step -= 1;
            tracing::debug!(
                event_name = "form.step_back",
                draft_id = %self.draft.id,
                step = self.current_step,
                "form step back"
            );
        }
        self.current_step
    }

    /// Jumps to a completed step, stays put, or advances to the immediate
    /// next step (which validates the current one).
    pub async fn go_to_step(
        &mut self,
        target: usize,
        now: DateTime<Utc>,
    ) -> Result<usize, NavigationError> {
        let len = self.definition.len();
        if target >= len {
            return Err(NavigationError::OutOfRange { target, len });
        }
        if target == self.current_step {
            return Ok(target);
        }
        if target < self.current_step || self.completed.contains(&target) {
            self.current_step = target;
            return Ok(target);
        }
        if target == self.current_step + 1 {
            let outcome = self.go_next(now).await?;
            return Ok(outcome.to);
        }

        let from = self.current_step;
        self.audit("form.navigation_rejected", AuditCategory::Form, AuditOutcome::Rejected, |event| {
            event.with_metadata("from", from.to_string()).with_metadata("target", target.to_string())
        });
        Err(NavigationError::SkipAhead { from, target })
    }

    /// Interval autosave. Writes once the debounce quiet period has passed,
    /// and otherwise retries any remote sync left over from earlier saves.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<Option<SaveReport>, DraftError> {
        let eligible = self.current_step > 0 || self.draft.persisted;
        if eligible && self.autosave.is_due(now) {
            return self.save_draft(now).await.map(Some);
        }

        if self.store.has_pending() {
            let synced = self.store.sync_pending().await;
            tracing::debug!(event_name = "draft.sync_retried", synced, "retried pending draft sync");
        }
        Ok(None)
    }

    /// Validates every step, assembles the request and sends it. The draft is
    /// discarded only once the gateway acknowledges the submission.
    pub async fn submit(&mut self, now: DateTime<Utc>) -> Result<SubmissionReceipt, SubmitError> {
        if self.autosave.is_dirty() && (self.current_step > 0 || self.draft.persisted) {
            if let Err(error) = self.save_draft(now).await {
                tracing::warn!(
                    event_name = "draft.autosave_failed",
                    draft_id = %self.draft.id,
                    error = %error,
                    "could not flush draft before submit"
                );
            }
        }

        if let Err(errors) = self.definition.validate_all(&self.payload) {
            self.audit("submission.rejected", AuditCategory::Submission, AuditOutcome::Rejected, |event| {
                event.with_metadata("step", errors.step.to_string())
            });
            return Err(SubmitError::Validation(errors));
        }

        let request = assemble_request(&self.payload).map_err(SubmitError::Assemble)?;
        let quote = self.pricing.as_ref().map(|pricing| pricing.quote(&request));
        if let Some(quote) = &quote {
            self.audit("pricing.quote_attached", AuditCategory::Pricing, AuditOutcome::Success, |event| {
                event
                    .with_metadata("total", quote.total.to_string())
                    .with_metadata("skipped_factors", quote.skipped.len().to_string())
            });
        }

        let payload = SubmissionPayload {
            draft_id: self.draft.persisted.then(|| self.draft.id.clone()),
            request,
            quote,
        };

        let receipt = match self.gateway.submit(&payload).await {
            Ok(receipt) => receipt,
            Err(error) => {
                tracing::warn!(
                    event_name = "submission.failed",
                    draft_id = %self.draft.id,
                    retryable = error.is_retryable(),
                    error = %error,
                    "submission failed, draft kept"
                );
                self.audit("submission.failed", AuditCategory::Submission, AuditOutcome::Failed, |event| {
                    event
                        .with_metadata("retryable", error.is_retryable().to_string())
                        .with_metadata("error", error.to_string())
                });
                return Err(SubmitError::Submission(error));
            }
        };

        if self.draft.persisted {
            match self.store.discard(&self.draft.id).await {
                Ok(()) => self.draft.persisted = false,
                Err(error) => tracing::warn!(
                    event_name = "draft.discard_failed",
                    draft_id = %self.draft.id,
                    error = %error,
                    "submitted draft could not be discarded"
                ),
            }
        }

        tracing::info!(
            event_name = "submission.acknowledged",
            draft_id = %self.draft.id,
            request_id = %receipt.id,
            "service request submitted"
        );
        self.audit("submission.acknowledged", AuditCategory::Submission, AuditOutcome::Success, |event| {
            event.with_metadata("request_id", receipt.id.clone())
        });
        Ok(receipt)
    }

    /// Explicit user discard: drops the stored draft and starts over.
    pub async fn discard_draft(&mut self) -> Result<(), DraftError> {
        self.store.discard(&self.draft.id).await?;
        self.audit("draft.discarded", AuditCategory::Draft, AuditOutcome::Success, |event| event);

        self.payload.clear();
        self.stops = JourneyStopList::new();
        self.current_step = 0;
        self.completed.clear();
        self.draft =
            DraftHandle { id: DraftId::generate(), created_at: None, revision: 0, persisted: false };
        self.autosave.mark_saved();
        Ok(())
    }

    fn validate_current(&self) -> Result<(), ValidationErrors> {
        match self.definition.step(self.current_step) {
            Some(step) => step.validate(&self.payload),
            None => Ok(()),
        }
    }

    async fn save_draft(&mut self, now: DateTime<Utc>) -> Result<SaveReport, DraftError> {
        let draft = ServiceRequestDraft {
            id: self.draft.id.clone(),
            created_at: self.draft.created_at.unwrap_or(now),
            updated_at: now,
            source: DraftSource::Local,
            revision: self.draft.revision,
            current_step: self.current_step,
            payload: self.payload.clone(),
        };

        let report = self.store.save(draft).await?;
        if report.outcome == SaveOutcome::Stale {
            tracing::warn!(
                event_name = "draft.save_stale",
                draft_id = %self.draft.id,
                stored_revision = report.revision,
                "a newer revision of this draft is already stored"
            );
            return Ok(report);
        }

        self.draft.revision = report.revision;
        self.draft.created_at.get_or_insert(now);
        self.draft.persisted = true;
        self.autosave.mark_saved();

        if report.outcome != SaveOutcome::Unchanged {
            let outcome = report.outcome;
            let synced = report.remote_synced;
            self.audit("draft.saved", AuditCategory::Draft, AuditOutcome::Success, |event| {
                event
                    .with_metadata("outcome", format!("{outcome:?}"))
                    .with_metadata("remote_synced", synced.to_string())
            });
        }
        Ok(report)
    }

    fn apply_request_type(&mut self) {
        match resolve_request_type(&self.payload) {
            Some(RequestType::Journey) => {
                if !self.stops.is_journey_mode() {
                    self.stops.set_journey_mode(true);
                    self.stops.seed_endpoints();
                    self.sync_stops_into_payload();
                }
            }
            _ => {
                if self.stops.is_journey_mode() || !self.stops.is_empty() {
                    self.stops = JourneyStopList::new();
                    self.payload.remove(fields::JOURNEY_STOPS);
                }
            }
        }
    }

    fn load_stops_from_payload(&mut self) {
        let journey = resolve_request_type(&self.payload) == Some(RequestType::Journey);
        let decoded = self
            .payload
            .get(fields::JOURNEY_STOPS)
            .cloned()
            .and_then(|value| serde_json::from_value::<Vec<JourneyStop>>(value).ok());

        self.stops = match decoded {
            Some(stops) => JourneyStopList::from_stops(stops, journey),
            None if journey => JourneyStopList::for_journey(),
            None => JourneyStopList::new(),
        };
        if journey && !self.payload.contains_key(fields::JOURNEY_STOPS) {
            self.sync_stops_into_payload();
        }
    }

    fn sync_stops_into_payload(&mut self) {
        match serde_json::to_value(self.stops.stops()) {
            Ok(value) => {
                self.payload.insert(fields::JOURNEY_STOPS.to_owned(), value);
            }
            Err(error) => tracing::error!(
                event_name = "form.stops_encode_failed",
                error = %error,
                "journey stops could not be written to the payload"
            ),
        }
    }

    fn audit<F>(&self, event_type: &str, category: AuditCategory, outcome: AuditOutcome, decorate: F)
    where
        F: FnOnce(crate::audit::AuditEvent) -> crate::audit::AuditEvent,
    {
        let Some(sink) = &self.audit_sink else {
            return;
        };
        let context = AuditContext::new(Some(self.draft.id.clone()), self.correlation_id.clone(), ACTOR);
        sink.emit(decorate(context.event(event_type, category, outcome)));
    }
}
