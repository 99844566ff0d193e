//! Page controller: owns all client state and drives the report lifecycle.
//!
//! One [`App`] is created per page session. It holds both report stores,
//! the visual state, the current route analysis, the submission draft and
//! the control flags, and it is the only thing that talks to the backend.
//! Every operation takes `&mut self`, so operations never interleave.
//!
//! Failures are handled once here: each one becomes a [`Notification`] (and
//! a log line) and is also returned to the caller. State is only changed
//! after the backend confirms.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use log::{info, warn};

use crate::backend::{Backend, Collection};
use crate::error::{IncidentError, OptionExt, Result};
use crate::lifecycle::{ReportState, Transition};
use crate::proximity::{ProximityConfig, RouteAnalysis};
use crate::report::{NewReport, ReportId, UNKNOWN_ADDRESS};
use crate::route::{Directions, RouteGeometry, RouteRequest};
use crate::store::ReportStore;
use crate::view::{UiEvent, ViewAction, ViewState};
use crate::GpsPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

/// Location picked for a new report.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedLocation {
    pub point: GpsPoint,
    /// Reverse-geocoded address, if the geocoder found one
    pub address: Option<String>,
}

/// Form values for a new report. Kept intact when submission fails.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportDraft {
    pub report_type: String,
    pub description: String,
    pub location: Option<SelectedLocation>,
}

#[derive(Debug, Default)]
struct ControlFlags {
    submitting: bool,
    /// Reports with a transition request in flight
    pending: HashSet<ReportId>,
}

/// Enabled/disabled state of the controls that trigger backend requests.
///
/// Clones share the same flags, so a renderer can hold a handle and watch a
/// control flip while its request is in flight.
#[derive(Debug, Clone, Default)]
pub struct Controls {
    flags: Arc<Mutex<ControlFlags>>,
}

impl Controls {
    fn flags(&self) -> MutexGuard<'_, ControlFlags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn submit_enabled(&self) -> bool {
        !self.flags().submitting
    }

    pub fn submit_label(&self) -> &'static str {
        if self.submit_enabled() {
            "Enviar Relato"
        } else {
            "Enviando..."
        }
    }

    pub fn transition_enabled(&self, id: &ReportId) -> bool {
        !self.flags().pending.contains(id)
    }

    /// Reports whose transition controls are currently disabled.
    pub fn pending(&self) -> HashSet<ReportId> {
        self.flags().pending.clone()
    }

    /// Disable the submit control until the returned guard is dropped.
    /// `None` if a submission is already in flight.
    fn begin_submit(&self) -> Option<InFlight> {
        let mut flags = self.flags();
        if flags.submitting {
            return None;
        }
        flags.submitting = true;
        Some(InFlight {
            controls: self.clone(),
            slot: Slot::Submit,
        })
    }

    /// Disable a report's transition controls until the guard is dropped.
    fn begin_transition(&self, id: &ReportId) -> Option<InFlight> {
        if !self.flags().pending.insert(id.clone()) {
            return None;
        }
        Some(InFlight {
            controls: self.clone(),
            slot: Slot::Transition(id.clone()),
        })
    }
}

enum Slot {
    Submit,
    Transition(ReportId),
}

/// Re-enables its control when dropped, including when the request future
/// is cancelled mid-flight.
struct InFlight {
    controls: Controls,
    slot: Slot,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut flags = self.controls.flags();
        match &self.slot {
            Slot::Submit => flags.submitting = false,
            Slot::Transition(id) => {
                flags.pending.remove(id);
            }
        }
    }
}

/// Application state for one page session.
pub struct App<B: Backend> {
    backend: B,
    active: ReportStore,
    resolved: ReportStore,
    view: ViewState,
    route: Option<RouteAnalysis>,
    proximity: ProximityConfig,
    draft: ReportDraft,
    controls: Controls,
    notifications: Vec<Notification>,
}

impl<B: Backend> App<B> {
    pub fn new(backend: B) -> Self {
        Self::with_proximity(backend, ProximityConfig::default())
    }

    pub fn with_proximity(backend: B, proximity: ProximityConfig) -> Self {
        Self {
            backend,
            active: ReportStore::new(Collection::Active),
            resolved: ReportStore::new(Collection::Resolved),
            view: ViewState::new(),
            route: None,
            proximity,
            draft: ReportDraft::default(),
            controls: Controls::default(),
            notifications: Vec::new(),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn active(&self) -> &ReportStore {
        &self.active
    }

    pub fn resolved(&self) -> &ReportStore {
        &self.resolved
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn route_analysis(&self) -> Option<&RouteAnalysis> {
        self.route.as_ref()
    }

    pub fn proximity(&self) -> &ProximityConfig {
        &self.proximity
    }

    pub fn draft(&self) -> &ReportDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut ReportDraft {
        &mut self.draft
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Hand pending notifications to the renderer.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Current lifecycle state of a report, as far as the loaded stores know.
    pub fn state_of(&self, id: &ReportId) -> Option<ReportState> {
        if self.active.contains(id) {
            Some(ReportState::Active)
        } else if self.resolved.contains(id) {
            Some(ReportState::Resolved)
        } else {
            None
        }
    }

    fn notify(&mut self, level: NotificationLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            NotificationLevel::Info => info!("[App] {}", message),
            NotificationLevel::Error => warn!("[App] {}", message),
        }
        self.notifications.push(Notification { level, message });
    }

    fn fail<T>(&mut self, error: IncidentError) -> Result<T> {
        self.notify(NotificationLevel::Error, error.to_string());
        Err(error)
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Bootstrap a page: active reports, flood alerts and weather, fetched
    /// concurrently.
    ///
    /// Only the report load decides the result; alert and weather failures
    /// degrade their widgets.
    pub async fn load_page(&mut self) -> Result<()> {
        let (reports, alerts, weather) = futures::join!(
            self.backend.fetch_reports(Collection::Active),
            self.backend.flood_alerts(),
            self.backend.weather(),
        );

        match alerts {
            Ok(alerts) => self.view.render_flood_alerts(&alerts),
            Err(e) => warn!("[App] Flood alerts unavailable: {}", e),
        }
        match weather {
            Ok(weather) => self.view.render_weather(Some(&weather)),
            Err(e) => {
                warn!("[App] Weather unavailable: {}", e);
                self.view.render_weather(None);
            }
        }

        let outcome = self.active.apply_fetch(reports).map(|_| ());
        self.after_active_reload(outcome)
    }

    /// Reload the active collection and re-render markers, list and any
    /// route analysis.
    pub async fn load_reports(&mut self) -> Result<()> {
        let outcome = self.active.reload(&self.backend).await.map(|_| ());
        self.after_active_reload(outcome)
    }

    fn after_active_reload(&mut self, outcome: Result<()>) -> Result<()> {
        if let Err(e) = outcome {
            self.view.reports_unavailable();
            return self.fail(e);
        }
        self.view.render_reports(self.active.reports());
        if let Some(analysis) = self.route.as_mut() {
            analysis.rerun(self.active.reports());
            self.view.show_route_analysis(analysis);
        }
        Ok(())
    }

    pub async fn load_resolved(&mut self) -> Result<()> {
        let outcome = self.resolved.reload(&self.backend).await.map(|_| ());
        match outcome {
            Ok(()) => {
                self.view.render_resolved(self.resolved.reports());
                Ok(())
            }
            Err(e) => {
                self.view.resolved_unavailable();
                self.fail(e)
            }
        }
    }

    pub async fn load_flood_alerts(&mut self) -> Result<()> {
        match self.backend.flood_alerts().await {
            Ok(alerts) => {
                self.view.render_flood_alerts(&alerts);
                Ok(())
            }
            Err(e) => {
                warn!("[App] Flood alerts unavailable: {}", e);
                Err(e)
            }
        }
    }

    pub async fn load_weather(&mut self) -> Result<()> {
        match self.backend.weather().await {
            Ok(weather) => {
                self.view.render_weather(Some(&weather));
                Ok(())
            }
            Err(e) => {
                warn!("[App] Weather unavailable: {}", e);
                self.view.render_weather(None);
                Err(e)
            }
        }
    }

    // ========================================================================
    // Lifecycle transitions
    // ========================================================================

    pub async fn resolve(&mut self, id: &ReportId) -> Result<()> {
        self.transition(id, Transition::Resolve).await
    }

    pub async fn undo(&mut self, id: &ReportId) -> Result<()> {
        self.transition(id, Transition::Undo).await
    }

    pub async fn delete(&mut self, id: &ReportId) -> Result<()> {
        self.transition(id, Transition::Delete).await
    }

    /// Ask the backend to move a report along the lifecycle, then reload.
    ///
    /// The transition is checked against the loaded stores first; nothing is
    /// sent for an unknown report or a disallowed edge. On backend failure
    /// no local state changes and the control is re-enabled.
    pub async fn transition(&mut self, id: &ReportId, transition: Transition) -> Result<()> {
        let checked = self
            .state_of(id)
            .ok_or_validation(&format!("Ocorrência {} não encontrada.", id))
            .and_then(|state| state.apply(transition));
        if let Err(e) = checked {
            return self.fail(e);
        }
        let outcome = match self.controls.begin_transition(id) {
            Some(_in_flight) => self.backend.transition(id, transition).await,
            None => {
                return self.fail(IncidentError::validation(format!(
                    "Ocorrência {} já está sendo atualizada.",
                    id
                )))
            }
        };
        if let Err(e) = outcome {
            return self.fail(e);
        }
        info!("[App] {} succeeded for report {}", transition, id);

        // The server has applied the change. Every affected collection is
        // reloaded even if one reload fails; those failures notify on their own.
        match transition {
            Transition::Resolve => {
                // Re-runs the route analysis against the refreshed store
                let _ = self.load_reports().await;
                if self.resolved.loaded() {
                    let _ = self.load_resolved().await;
                }
            }
            Transition::Undo => {
                let _ = self.load_resolved().await;
                let _ = self.load_reports().await;
            }
            Transition::Delete => {
                let _ = self.load_resolved().await;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Report submission
    // ========================================================================

    /// Set the location for a new report (map click, geolocation fix or
    /// autocomplete pick). Replaces any previous selection.
    pub fn select_location(&mut self, point: GpsPoint, address: Option<String>) {
        self.view.set_draft_marker(point, address.as_deref());
        self.draft.location = Some(SelectedLocation { point, address });
    }

    /// Record the reverse-geocoded address once it arrives.
    pub fn set_selected_address(&mut self, address: String) {
        if let Some(location) = self.draft.location.as_mut() {
            self.view.set_draft_marker(location.point, Some(&address));
            location.address = Some(address);
        }
    }

    /// Submit the draft as a new report.
    ///
    /// The submit control stays disabled until the request settles. On
    /// failure the draft is kept as entered.
    pub async fn submit(&mut self) -> Result<()> {
        let location = match self.draft.location.clone().ok_or_validation(
            "Selecione um local no mapa ou digite um endereço válido.",
        ) {
            Ok(location) => location,
            Err(e) => return self.fail(e),
        };

        let report = NewReport {
            report_type: self.draft.report_type.clone(),
            description: self.draft.description.clone(),
            latitude: location.point.latitude,
            longitude: location.point.longitude,
            address: location
                .address
                .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string()),
            timestamp: Utc::now(),
        };

        let outcome = match self.controls.begin_submit() {
            Some(_in_flight) => self.backend.submit_report(&report).await,
            None => return self.fail(IncidentError::validation("Envio em andamento.")),
        };

        if let Err(e) = outcome {
            return self.fail(e);
        }

        self.notify(NotificationLevel::Info, "Relato enviado com sucesso!");
        self.draft = ReportDraft::default();
        self.view.clear_draft_marker();
        // The report exists server-side now; a failed refresh is reported on its own
        let _ = self.load_reports().await;
        Ok(())
    }

    // ========================================================================
    // Route analysis
    // ========================================================================

    /// Analyse a route against the loaded active reports and show the result.
    pub fn analyze_route(&mut self, route: RouteGeometry) -> &RouteAnalysis {
        let analysis = RouteAnalysis::run(self.active.reports(), route, self.proximity);
        info!("[App] {}", analysis.summary());
        self.view.show_route_analysis(&analysis);
        self.route.insert(analysis)
    }

    /// Ask the directions provider for a route between two addresses and
    /// analyse it.
    pub async fn check_route<D: Directions>(
        &mut self,
        request: &RouteRequest,
        directions: &D,
    ) -> Result<&RouteAnalysis> {
        if let Err(e) = request.validate() {
            return self.fail(e);
        }
        let route = match directions.route(request).await {
            Ok(route) => route,
            Err(e) => {
                return self.fail(IncidentError::network(
                    format!("Não foi possível traçar a rota: {}", e),
                    e.status_code(),
                ))
            }
        };
        Ok(self.analyze_route(route))
    }

    /// Leave route mode.
    pub fn clear_route(&mut self) {
        self.route = None;
        self.view.clear_route();
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Dispatch a UI event, running any backend work it requires.
    pub async fn handle_event(&mut self, event: UiEvent) -> Result<()> {
        if event == UiEvent::ClearRouteClicked {
            self.clear_route();
            return Ok(());
        }
        match self.view.handle(event) {
            Some(ViewAction::Transition(id, transition)) => self.transition(&id, transition).await,
            Some(ViewAction::SelectLocation(point)) => {
                self.select_location(point, None);
                Ok(())
            }
            None => Ok(()),
        }
    }
}
