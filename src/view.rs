//! View synchronization: the visual state derived from reports and analyses.
//!
//! [`ViewState`] is a plain value describing what the page shows: markers,
//! lists, overlays, the info popup and the camera. Every `render_*` method
//! clears what it owns before rebuilding, so applying the same inputs twice
//! yields the same state. Nothing here mutates report data.
//!
//! User input arrives as [`UiEvent`]s through [`ViewState::handle`]. Purely
//! visual events (pan, popup) are applied directly. Events that need the
//! backend come back out as a [`ViewAction`] for the controller.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::lifecycle::Transition;
use crate::proximity::RouteAnalysis;
use crate::report::{FloodAlert, Report, ReportId, Weather};
use crate::GpsPoint;

/// Marker opacity for reports on the analysed route (and outside route mode).
pub const ON_ROUTE_OPACITY: f32 = 1.0;
/// Marker opacity for reports off the analysed route.
pub const OFF_ROUTE_OPACITY: f32 = 0.4;
/// Radius of the flood alert circle overlay.
pub const FLOOD_ALERT_RADIUS_METERS: f64 = 150.0;
/// Zoom level used when focusing a single report or address.
pub const FOCUS_ZOOM: u8 = 17;

/// Initial map center (Maceió).
pub const DEFAULT_CENTER: GpsPoint = GpsPoint {
    latitude: -9.6658,
    longitude: -35.7351,
};
pub const DEFAULT_ZOOM: u8 = 14;

const EMPTY_REPORTS: &str = "Nenhuma ocorrência registrada.";
const EMPTY_ROUTE: &str = "Nenhum problema no trajeto.";
const EMPTY_RESOLVED: &str = "Nenhuma ocorrência resolvida encontrada.";
const RESOLVED_LOAD_ERROR: &str = "Erro ao carregar ocorrências.";
const REPORTS_LOAD_ERROR: &str = "Erro ao carregar relatos.";
const WEATHER_UNAVAILABLE: &str = "Clima indisponível";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerIcon {
    Default,
    /// Highlighted icon for reports on the analysed route
    Problem,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub report_id: ReportId,
    pub position: GpsPoint,
    pub title: String,
    pub icon: MarkerIcon,
    pub opacity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemAction {
    Resolve,
    Undo,
    Delete,
}

impl ItemAction {
    pub fn label(self) -> &'static str {
        match self {
            ItemAction::Resolve => "Ocorrência Resolvida",
            ItemAction::Undo => "Desfazer",
            ItemAction::Delete => "Excluir Permanentemente",
        }
    }
}

/// One rendered report in a list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListItem {
    pub report_id: ReportId,
    pub position: GpsPoint,
    pub report_type: String,
    pub description: String,
    pub address: String,
    /// Date line under the report, already formatted
    pub dates: String,
    pub on_route: bool,
    pub actions: Vec<ItemAction>,
}

/// A list of report items, or a placeholder message when there are none.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportList {
    pub items: Vec<ListItem>,
    pub placeholder: Option<String>,
}

impl ReportList {
    fn build(items: Vec<ListItem>, empty_message: &str) -> Self {
        let placeholder = items.is_empty().then(|| empty_message.to_string());
        Self { items, placeholder }
    }

    fn error(message: &str) -> Self {
        Self {
            items: Vec::new(),
            placeholder: Some(message.to_string()),
        }
    }

    pub fn find(&self, id: &ReportId) -> Option<&ListItem> {
        self.items.iter().find(|item| &item.report_id == id)
    }
}

/// Panel shown while a route analysis is active.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePanel {
    pub summary: String,
    pub list: ReportList,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloodOverlay {
    pub center: GpsPoint,
    pub radius_meters: f64,
    pub risk_level: String,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum WeatherWidget {
    #[default]
    Loading,
    Ready {
        icon_url: String,
        temperature: String,
        description: String,
    },
    Unavailable {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfoPopup {
    pub position: GpsPoint,
    /// Report whose marker the popup is attached to
    pub anchor: Option<ReportId>,
    pub title: String,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Camera {
    pub center: GpsPoint,
    pub zoom: u8,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
        }
    }
}

/// The location picked for a new report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftMarker {
    pub position: GpsPoint,
    /// "Endereço: ..." label once the address is known
    pub address_label: Option<String>,
}

/// User input, one variant per control.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// Click anywhere on a report list item except its action buttons
    ItemClicked(ReportId),
    /// Click on the item's embedded resolve button
    ResolveClicked(ReportId),
    UndoClicked(ReportId),
    DeleteClicked(ReportId),
    MarkerClicked(ReportId),
    /// Click on the n-th flood alert circle
    FloodAlertClicked(usize),
    MapClicked(GpsPoint),
    ClearRouteClicked,
}

/// Work the controller must do in response to an event.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewAction {
    Transition(ReportId, Transition),
    SelectLocation(GpsPoint),
}

/// Everything the page shows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewState {
    pub markers: Vec<Marker>,
    pub reports_list: ReportList,
    /// Shown above the main list when the last reload failed; the cached
    /// markers and items stay visible underneath
    pub reports_error: Option<String>,
    /// Present while a route analysis is shown
    pub route_panel: Option<RoutePanel>,
    pub resolved_list: ReportList,
    pub flood_overlays: Vec<FloodOverlay>,
    pub weather: WeatherWidget,
    pub draft_marker: Option<DraftMarker>,
    pub popup: Option<InfoPopup>,
    pub camera: Camera,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild markers and the main list from the active reports.
    ///
    /// Markers come back with the default icon at full opacity; route
    /// highlighting is reapplied separately.
    pub fn render_reports(&mut self, reports: &[Report]) {
        self.markers = reports
            .iter()
            .map(|r| Marker {
                report_id: r.id.clone(),
                position: r.point(),
                title: r.report_type.clone(),
                icon: MarkerIcon::Default,
                opacity: ON_ROUTE_OPACITY,
            })
            .collect();
        self.reports_list = ReportList::build(
            reports.iter().map(|r| active_item(r, false)).collect(),
            EMPTY_REPORTS,
        );
        self.reports_error = None;
        // Drop a popup whose marker is gone
        let dangling = match self.popup.as_ref().and_then(|p| p.anchor.as_ref()) {
            Some(anchor) => !self.markers.iter().any(|m| &m.report_id == anchor),
            None => false,
        };
        if dangling {
            self.popup = None;
        }
    }

    /// Highlight markers whose report is in `on_route`, dim the rest.
    pub fn partition_markers(&mut self, on_route: &HashSet<ReportId>) {
        for marker in &mut self.markers {
            if on_route.contains(&marker.report_id) {
                marker.icon = MarkerIcon::Problem;
                marker.opacity = ON_ROUTE_OPACITY;
            } else {
                marker.icon = MarkerIcon::Default;
                marker.opacity = OFF_ROUTE_OPACITY;
            }
        }
    }

    /// Show a route analysis: summary, on-route list and marker partition.
    pub fn show_route_analysis(&mut self, analysis: &RouteAnalysis) {
        self.route_panel = Some(RoutePanel {
            summary: analysis.summary(),
            list: ReportList::build(
                analysis.on_route.iter().map(|r| active_item(r, true)).collect(),
                EMPTY_ROUTE,
            ),
        });
        self.partition_markers(&analysis.on_route_ids());
    }

    /// Leave route mode and restore every marker.
    pub fn clear_route(&mut self) {
        self.route_panel = None;
        for marker in &mut self.markers {
            marker.icon = MarkerIcon::Default;
            marker.opacity = ON_ROUTE_OPACITY;
        }
    }

    /// Flag the main list as stale after a failed reload.
    pub fn reports_unavailable(&mut self) {
        self.reports_error = Some(REPORTS_LOAD_ERROR.to_string());
    }

    pub fn render_resolved(&mut self, reports: &[Report]) {
        self.resolved_list =
            ReportList::build(reports.iter().map(resolved_item).collect(), EMPTY_RESOLVED);
    }

    /// Show the error placeholder in the resolved list.
    pub fn resolved_unavailable(&mut self) {
        self.resolved_list = ReportList::error(RESOLVED_LOAD_ERROR);
    }

    pub fn render_flood_alerts(&mut self, alerts: &[FloodAlert]) {
        self.flood_overlays = alerts
            .iter()
            .map(|a| FloodOverlay {
                center: GpsPoint::new(a.latitude, a.longitude),
                radius_meters: FLOOD_ALERT_RADIUS_METERS,
                risk_level: a.risk_level.clone(),
                address: a.address.clone(),
            })
            .collect();
    }

    /// Render the header weather widget from the first forecast.
    pub fn render_weather(&mut self, weather: Option<&Weather>) {
        self.weather = match weather.and_then(Weather::current) {
            Some(f) => WeatherWidget::Ready {
                icon_url: format!("https://openweathermap.org/img/wn/{}.png", f.icon),
                temperature: format!("{}°C", f.temp.round() as i64),
                description: f.description.clone(),
            },
            None => WeatherWidget::Unavailable {
                message: WEATHER_UNAVAILABLE.to_string(),
            },
        };
    }

    /// Place (or move) the draft marker for a new report.
    pub fn set_draft_marker(&mut self, position: GpsPoint, address: Option<&str>) {
        self.draft_marker = Some(DraftMarker {
            position,
            address_label: address.map(|a| format!("Endereço: {}", a)),
        });
    }

    pub fn clear_draft_marker(&mut self) {
        self.draft_marker = None;
    }

    /// Focus the camera on a point at street zoom.
    pub fn focus(&mut self, position: GpsPoint) {
        self.camera = Camera {
            center: position,
            zoom: FOCUS_ZOOM,
        };
    }

    /// Single dispatch point for user input.
    pub fn handle(&mut self, event: UiEvent) -> Option<ViewAction> {
        match event {
            UiEvent::ItemClicked(id) => {
                self.open_item(&id);
                None
            }
            UiEvent::ResolveClicked(id) => Some(ViewAction::Transition(id, Transition::Resolve)),
            UiEvent::UndoClicked(id) => Some(ViewAction::Transition(id, Transition::Undo)),
            UiEvent::DeleteClicked(id) => Some(ViewAction::Transition(id, Transition::Delete)),
            UiEvent::MarkerClicked(id) => {
                self.open_marker(&id);
                None
            }
            UiEvent::FloodAlertClicked(index) => {
                self.open_flood_alert(index);
                None
            }
            UiEvent::MapClicked(point) => Some(ViewAction::SelectLocation(point)),
            UiEvent::ClearRouteClicked => {
                self.clear_route();
                None
            }
        }
    }

    fn find_item(&self, id: &ReportId) -> Option<&ListItem> {
        self.route_panel
            .as_ref()
            .and_then(|panel| panel.list.find(id))
            .or_else(|| self.reports_list.find(id))
    }

    /// Pan to the report and open a short popup on its marker.
    fn open_item(&mut self, id: &ReportId) {
        let Some(item) = self.find_item(id).cloned() else {
            return;
        };
        self.focus(item.position);
        if let Some(marker) = self.markers.iter().find(|m| &m.report_id == id) {
            self.popup = Some(InfoPopup {
                position: marker.position,
                anchor: Some(id.clone()),
                title: item.report_type,
                lines: vec![item.description, item.address],
            });
        }
    }

    fn open_marker(&mut self, id: &ReportId) {
        let Some(marker) = self.markers.iter().find(|m| &m.report_id == id) else {
            return;
        };
        let position = marker.position;
        let Some(item) = self.reports_list.find(id) else {
            return;
        };
        self.popup = Some(InfoPopup {
            position,
            anchor: Some(id.clone()),
            title: item.report_type.clone(),
            lines: vec![
                item.description.clone(),
                item.address.clone(),
                item.dates.clone(),
            ],
        });
    }

    fn open_flood_alert(&mut self, index: usize) {
        let Some(overlay) = self.flood_overlays.get(index) else {
            return;
        };
        self.popup = Some(InfoPopup {
            position: overlay.center,
            anchor: None,
            title: "Alerta de Alagamento".to_string(),
            lines: vec![
                format!("Risco: {}", overlay.risk_level),
                format!(
                    "Endereço do problema: {}",
                    overlay.address.as_deref().unwrap_or("Não informado")
                ),
            ],
        });
    }
}

fn format_datetime(instant: &DateTime<Utc>) -> String {
    instant.format("%d/%m/%Y %H:%M:%S").to_string()
}

fn format_date(instant: &DateTime<Utc>) -> String {
    instant.format("%d/%m/%Y").to_string()
}

fn active_item(report: &Report, on_route: bool) -> ListItem {
    ListItem {
        report_id: report.id.clone(),
        position: report.point(),
        report_type: report.report_type.clone(),
        description: report.description.clone(),
        address: report.display_address().to_string(),
        dates: format_datetime(&report.timestamp),
        on_route,
        actions: vec![ItemAction::Resolve],
    }
}

fn resolved_item(report: &Report) -> ListItem {
    let resolved = report
        .resolved_at
        .as_ref()
        .map(format_date)
        .unwrap_or_else(|| "-".to_string());
    ListItem {
        report_id: report.id.clone(),
        position: report.point(),
        report_type: report.report_type.clone(),
        description: report.description.clone(),
        address: report.display_address().to_string(),
        dates: format!(
            "Reportado em: {} | Resolvido em: {}",
            format_date(&report.timestamp),
            resolved
        ),
        on_route: false,
        actions: vec![ItemAction::Undo, ItemAction::Delete],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proximity::ProximityConfig;
    use crate::report::Forecast;
    use crate::route::RouteGeometry;
    use chrono::TimeZone;

    fn report(id: u64, lat: f64, lng: f64) -> Report {
        Report {
            id: ReportId::Number(id),
            report_type: "alagamento".to_string(),
            description: format!("report {}", id),
            latitude: lat,
            longitude: lng,
            address: Some(format!("Rua {}", id)),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
            resolved_at: None,
        }
    }

    fn sample() -> Vec<Report> {
        vec![report(1, -9.66, -35.73), report(2, -9.80, -36.0)]
    }

    fn analysis(reports: &[Report]) -> RouteAnalysis {
        let route = RouteGeometry::new(vec![
            GpsPoint::new(-9.6605, -35.73),
            GpsPoint::new(-9.6595, -35.73),
        ]).unwrap();
        RouteAnalysis::run(reports, route, ProximityConfig::default())
    }

    #[test]
    fn test_render_reports_replaces_previous() {
        let mut view = ViewState::new();
        view.render_reports(&sample());
        view.render_reports(&sample());
        assert_eq!(view.markers.len(), 2);
        assert_eq!(view.reports_list.items.len(), 2);
        assert!(view.reports_list.placeholder.is_none());

        view.render_reports(&[]);
        assert!(view.markers.is_empty());
        assert_eq!(
            view.reports_list.placeholder.as_deref(),
            Some("Nenhuma ocorrência registrada.")
        );
    }

    #[test]
    fn test_reports_error_keeps_items_until_next_render() {
        let mut view = ViewState::new();
        view.render_reports(&sample());
        view.reports_unavailable();
        assert_eq!(view.reports_error.as_deref(), Some("Erro ao carregar relatos."));
        assert_eq!(view.reports_list.items.len(), 2);

        view.render_reports(&sample());
        assert!(view.reports_error.is_none());
    }

    #[test]
    fn test_route_partition() {
        let reports = sample();
        let mut view = ViewState::new();
        view.render_reports(&reports);
        view.show_route_analysis(&analysis(&reports));

        let on = &view.markers[0];
        assert_eq!(on.icon, MarkerIcon::Problem);
        assert_eq!(on.opacity, ON_ROUTE_OPACITY);
        let off = &view.markers[1];
        assert_eq!(off.icon, MarkerIcon::Default);
        assert_eq!(off.opacity, OFF_ROUTE_OPACITY);

        let panel = view.route_panel.as_ref().unwrap();
        assert_eq!(panel.summary, "Análise da Rota: 1 problema(s) encontrado(s)");
        assert_eq!(panel.list.items.len(), 1);
        assert!(panel.list.items[0].on_route);
    }

    #[test]
    fn test_partition_is_idempotent() {
        let reports = sample();
        let analysis = analysis(&reports);
        let mut view = ViewState::new();
        view.render_reports(&reports);
        view.show_route_analysis(&analysis);
        let once = view.clone();
        view.show_route_analysis(&analysis);
        assert_eq!(view, once);
    }

    #[test]
    fn test_empty_route_result_placeholder() {
        let reports = vec![report(2, -9.80, -36.0)];
        let mut view = ViewState::new();
        view.render_reports(&reports);
        view.show_route_analysis(&analysis(&reports));
        let panel = view.route_panel.as_ref().unwrap();
        assert_eq!(panel.list.placeholder.as_deref(), Some("Nenhum problema no trajeto."));
        assert!(view.markers.iter().all(|m| m.opacity == OFF_ROUTE_OPACITY));
    }

    #[test]
    fn test_clear_route_restores_markers() {
        let reports = sample();
        let mut view = ViewState::new();
        view.render_reports(&reports);
        view.show_route_analysis(&analysis(&reports));
        assert_eq!(view.handle(UiEvent::ClearRouteClicked), None);
        assert!(view.route_panel.is_none());
        assert!(view
            .markers
            .iter()
            .all(|m| m.icon == MarkerIcon::Default && m.opacity == ON_ROUTE_OPACITY));
    }

    #[test]
    fn test_item_click_pans_and_opens_popup() {
        let mut view = ViewState::new();
        view.render_reports(&sample());
        let action = view.handle(UiEvent::ItemClicked(ReportId::Number(1)));
        assert_eq!(action, None);
        assert_eq!(view.camera.center, GpsPoint::new(-9.66, -35.73));
        assert_eq!(view.camera.zoom, FOCUS_ZOOM);
        let popup = view.popup.as_ref().unwrap();
        assert_eq!(popup.title, "alagamento");
        assert_eq!(popup.lines, vec!["report 1".to_string(), "Rua 1".to_string()]);
    }

    #[test]
    fn test_resolve_click_does_not_pan() {
        let mut view = ViewState::new();
        view.render_reports(&sample());
        let before = view.clone();
        let action = view.handle(UiEvent::ResolveClicked(ReportId::Number(1)));
        assert_eq!(
            action,
            Some(ViewAction::Transition(ReportId::Number(1), Transition::Resolve))
        );
        assert_eq!(view, before);
    }

    #[test]
    fn test_marker_popup_includes_timestamp() {
        let mut view = ViewState::new();
        view.render_reports(&sample());
        view.handle(UiEvent::MarkerClicked(ReportId::Number(2)));
        let popup = view.popup.as_ref().unwrap();
        assert_eq!(popup.lines[2], "01/05/2024 12:30:00");
    }

    #[test]
    fn test_resolved_list_dates_and_actions() {
        let mut resolved = report(1, -9.66, -35.73);
        resolved.resolved_at = Some(Utc.with_ymd_and_hms(2024, 5, 3, 9, 0, 0).unwrap());
        let mut view = ViewState::new();
        view.render_resolved(&[resolved]);
        let item = &view.resolved_list.items[0];
        assert_eq!(item.dates, "Reportado em: 01/05/2024 | Resolvido em: 03/05/2024");
        assert_eq!(item.actions, vec![ItemAction::Undo, ItemAction::Delete]);

        view.render_resolved(&[]);
        assert_eq!(
            view.resolved_list.placeholder.as_deref(),
            Some("Nenhuma ocorrência resolvida encontrada.")
        );
    }

    #[test]
    fn test_flood_alert_overlay_and_popup() {
        let mut view = ViewState::new();
        view.render_flood_alerts(&[FloodAlert {
            latitude: -9.65,
            longitude: -35.71,
            risk_level: "alto".to_string(),
            address: None,
        }]);
        assert_eq!(view.flood_overlays[0].radius_meters, 150.0);
        view.handle(UiEvent::FloodAlertClicked(0));
        let popup = view.popup.as_ref().unwrap();
        assert_eq!(popup.title, "Alerta de Alagamento");
        assert_eq!(popup.lines[1], "Endereço do problema: Não informado");
        // Out of range is ignored
        view.handle(UiEvent::FloodAlertClicked(9));
        assert_eq!(view.popup.as_ref().unwrap().position, GpsPoint::new(-9.65, -35.71));
    }

    #[test]
    fn test_weather_widget() {
        let mut view = ViewState::new();
        assert_eq!(view.weather, WeatherWidget::Loading);
        let weather = Weather {
            forecasts: vec![Forecast {
                icon: "10d".to_string(),
                description: "chuva leve".to_string(),
                temp: 27.6,
            }],
        };
        view.render_weather(Some(&weather));
        assert_eq!(
            view.weather,
            WeatherWidget::Ready {
                icon_url: "https://openweathermap.org/img/wn/10d.png".to_string(),
                temperature: "28°C".to_string(),
                description: "chuva leve".to_string(),
            }
        );
        view.render_weather(Some(&Weather { forecasts: vec![] }));
        assert!(matches!(view.weather, WeatherWidget::Unavailable { .. }));
    }

    #[test]
    fn test_popup_closed_when_marker_removed() {
        let mut view = ViewState::new();
        view.render_reports(&sample());
        view.handle(UiEvent::MarkerClicked(ReportId::Number(1)));
        assert!(view.popup.is_some());
        view.render_reports(&sample()[1..]);
        assert!(view.popup.is_none());
    }

    #[test]
    fn test_map_click_requests_location() {
        let mut view = ViewState::new();
        let p = GpsPoint::new(-9.6, -35.7);
        assert_eq!(
            view.handle(UiEvent::MapClicked(p)),
            Some(ViewAction::SelectLocation(p))
        );
    }
}
