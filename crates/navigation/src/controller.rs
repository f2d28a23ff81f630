use diagnostics::{Counters, DiagnosticKind, DiagnosticLog, STALE_RESPONSES};
use formats::{
    MunicipalityDetail, MunicipalitySummary, PrefectureSummary, RegionSummary, StatsSummary,
    normalize_code,
};
use foundation::RequestToken;
use streaming::RequestLedger;

use crate::level::ViewLevel;
use crate::selection::{Crumb, SelectionPath};

/// Independent streams of upstream data. Staleness is tracked per channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Channel {
    Regions,
    AllPrefectures,
    Stats,
    Prefectures,
    Municipalities,
    Detail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRequest {
    Regions,
    AllPrefectures,
    Stats,
    Prefectures { region: String },
    Municipalities { prefecture: String, region: Option<String> },
    Detail { code: String },
}

impl FetchRequest {
    pub fn channel(&self) -> Channel {
        match self {
            FetchRequest::Regions => Channel::Regions,
            FetchRequest::AllPrefectures => Channel::AllPrefectures,
            FetchRequest::Stats => Channel::Stats,
            FetchRequest::Prefectures { .. } => Channel::Prefectures,
            FetchRequest::Municipalities { .. } => Channel::Municipalities,
            FetchRequest::Detail { .. } => Channel::Detail,
        }
    }
}

/// A fetch the caller must perform; its result goes back through
/// `apply`/`fail` together with `token`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub token: RequestToken,
    pub request: FetchRequest,
}

impl FetchTicket {
    pub fn channel(&self) -> Channel {
        self.request.channel()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchResponse {
    Regions(Vec<RegionSummary>),
    AllPrefectures(Vec<PrefectureSummary>),
    Stats(StatsSummary),
    Prefectures(Vec<PrefectureSummary>),
    Municipalities(Vec<MunicipalitySummary>),
    Detail(Box<MunicipalityDetail>),
}

impl FetchResponse {
    pub fn channel(&self) -> Channel {
        match self {
            FetchResponse::Regions(_) => Channel::Regions,
            FetchResponse::AllPrefectures(_) => Channel::AllPrefectures,
            FetchResponse::Stats(_) => Channel::Stats,
            FetchResponse::Prefectures(_) => Channel::Prefectures,
            FetchResponse::Municipalities(_) => Channel::Municipalities,
            FetchResponse::Detail(_) => Channel::Detail,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// Superseded or duplicate; nothing changed.
    Stale,
    /// Latest request failed; previous state kept.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    InvalidTransition { from: ViewLevel, to: ViewLevel },
    UnknownRegion(String),
    UnknownPrefecture(String),
    UnknownMunicipality(String),
    /// A clicked prefecture whose owning region is not known.
    UnresolvedRegion(String),
    AtRoot,
    NoDetailOpen,
}

impl std::fmt::Display for NavigationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NavigationError::InvalidTransition { from, to } => {
                write!(f, "cannot go from {from} to {to}")
            }
            NavigationError::UnknownRegion(r) => write!(f, "no summary for region {r:?}"),
            NavigationError::UnknownPrefecture(p) => write!(f, "no summary for prefecture {p:?}"),
            NavigationError::UnknownMunicipality(c) => {
                write!(f, "no summary for municipality code {c:?}")
            }
            NavigationError::UnresolvedRegion(p) => {
                write!(f, "no region known for prefecture {p:?}")
            }
            NavigationError::AtRoot => write!(f, "already at the national level"),
            NavigationError::NoDetailOpen => write!(f, "no municipality detail is open"),
        }
    }
}

impl std::error::Error for NavigationError {}

/// Drill-down state machine.
///
/// Owns the active level, the selection path and the summaries of the
/// current level. Every transition either succeeds and returns the fetch it
/// needs, or fails and leaves level and selection untouched. Responses are
/// applied only when they answer the latest request of their channel.
#[derive(Debug, Default)]
pub struct ViewLevelController {
    level: ViewLevel,
    selection: SelectionPath,
    ledger: RequestLedger<Channel>,
    regions: Vec<RegionSummary>,
    all_prefectures: Vec<PrefectureSummary>,
    prefectures: Vec<PrefectureSummary>,
    municipalities: Vec<MunicipalitySummary>,
    detail: Option<MunicipalityDetail>,
    stats: Option<StatsSummary>,
    diagnostics: DiagnosticLog,
    counters: Counters,
}

impl ViewLevelController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> ViewLevel {
        self.level
    }

    pub fn selection(&self) -> &SelectionPath {
        &self.selection
    }

    pub fn regions(&self) -> &[RegionSummary] {
        &self.regions
    }

    /// Every prefecture nationwide, loaded at startup.
    pub fn all_prefectures(&self) -> &[PrefectureSummary] {
        &self.all_prefectures
    }

    /// Prefectures of the selected region.
    pub fn prefectures(&self) -> &[PrefectureSummary] {
        &self.prefectures
    }

    /// Municipalities of the selected prefecture.
    pub fn municipalities(&self) -> &[MunicipalitySummary] {
        &self.municipalities
    }

    pub fn detail(&self) -> Option<&MunicipalityDetail> {
        self.detail.as_ref()
    }

    pub fn stats(&self) -> Option<&StatsSummary> {
        self.stats.as_ref()
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut DiagnosticLog {
        &mut self.diagnostics
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn counters_mut(&mut self) -> &mut Counters {
        &mut self.counters
    }

    pub fn pending(&self, channel: Channel) -> Option<RequestToken> {
        self.ledger.pending(channel)
    }

    pub fn municipality(&self, code: &str) -> Option<&MunicipalitySummary> {
        let key = normalize_code(code);
        self.municipalities
            .iter()
            .find(|m| normalize_code(&m.city_code) == key)
    }

    /// Breadcrumb trail; the municipality crumb shows its name when known.
    pub fn breadcrumb(&self) -> Vec<Crumb> {
        let mut crumbs = self.selection.crumbs(self.level);
        if let Some(last) = crumbs.last_mut() {
            if last.level == ViewLevel::Municipality {
                if let Some(m) = self.municipality(&last.label) {
                    last.label = m.city_name.clone();
                }
            }
        }
        crumbs
    }

    /// Fetches every session needs before the first interaction.
    pub fn initial_requests(&mut self) -> Vec<FetchTicket> {
        [
            FetchRequest::Regions,
            FetchRequest::AllPrefectures,
            FetchRequest::Stats,
        ]
        .into_iter()
        .map(|request| self.issue(request))
        .collect()
    }

    pub fn enter_region(&mut self, region: &str) -> Result<FetchTicket, NavigationError> {
        let region = region.trim();
        if !matches!(self.level, ViewLevel::National | ViewLevel::Region) {
            return Err(self.reject(NavigationError::InvalidTransition {
                from: self.level,
                to: ViewLevel::Region,
            }));
        }
        if !self.region_known(region) {
            return Err(self.reject(NavigationError::UnknownRegion(region.to_string())));
        }

        let from = self.level;
        if self.selection.region() != Some(region) {
            self.prefectures.clear();
        }
        self.selection.set_region(region);
        self.level = ViewLevel::Region;
        self.municipalities.clear();
        self.detail = None;
        self.ledger.invalidate(Channel::Municipalities);
        self.ledger.invalidate(Channel::Detail);
        self.transitioned(from, region);
        Ok(self.issue(FetchRequest::Prefectures {
            region: region.to_string(),
        }))
    }

    pub fn enter_prefecture(&mut self, prefecture: &str) -> Result<FetchTicket, NavigationError> {
        let prefecture = prefecture.trim();
        if self.level != ViewLevel::Region {
            return Err(self.reject(NavigationError::InvalidTransition {
                from: self.level,
                to: ViewLevel::Prefecture,
            }));
        }
        if !self.prefecture_known(prefecture) {
            return Err(self.reject(NavigationError::UnknownPrefecture(prefecture.to_string())));
        }
        if !self.selection.set_prefecture(prefecture) {
            return Err(self.reject(NavigationError::InvalidTransition {
                from: self.level,
                to: ViewLevel::Prefecture,
            }));
        }

        self.level = ViewLevel::Prefecture;
        self.municipalities.clear();
        self.detail = None;
        self.ledger.invalidate(Channel::Detail);
        self.transitioned(ViewLevel::Region, prefecture);
        Ok(self.issue(FetchRequest::Municipalities {
            prefecture: prefecture.to_string(),
            region: self.selection.region().map(str::to_string),
        }))
    }

    /// Opens the detail overlay. Also accepted from `Municipality` to switch
    /// to a sibling without closing first.
    pub fn enter_municipality(&mut self, code: &str) -> Result<FetchTicket, NavigationError> {
        if !matches!(self.level, ViewLevel::Prefecture | ViewLevel::Municipality) {
            return Err(self.reject(NavigationError::InvalidTransition {
                from: self.level,
                to: ViewLevel::Municipality,
            }));
        }
        let Some(city_code) = self.municipality(code).map(|m| m.city_code.clone()) else {
            return Err(self.reject(NavigationError::UnknownMunicipality(code.trim().to_string())));
        };
        if !self.selection.set_municipality(city_code.clone()) {
            return Err(self.reject(NavigationError::InvalidTransition {
                from: self.level,
                to: ViewLevel::Municipality,
            }));
        }

        let from = self.level;
        self.level = ViewLevel::Municipality;
        self.detail = None;
        self.transitioned(from, &city_code);
        Ok(self.issue(FetchRequest::Detail { code: city_code }))
    }

    /// Pops one level, clears the selection below it and closes any detail.
    /// The landed level's summaries are refetched; the list on screen stays
    /// until the refresh arrives.
    pub fn navigate_back(&mut self) -> Result<FetchTicket, NavigationError> {
        let Some(target) = self.level.parent() else {
            return Err(self.reject(NavigationError::AtRoot));
        };
        let from = self.level;

        self.selection.clear_below(target);
        self.level = target;
        self.detail = None;
        self.ledger.invalidate(Channel::Detail);

        let request = match target {
            ViewLevel::Prefecture => FetchRequest::Municipalities {
                prefecture: self.selection.prefecture().unwrap_or_default().to_string(),
                region: self.selection.region().map(str::to_string),
            },
            ViewLevel::Region => {
                self.municipalities.clear();
                self.ledger.invalidate(Channel::Municipalities);
                FetchRequest::Prefectures {
                    region: self.selection.region().unwrap_or_default().to_string(),
                }
            }
            ViewLevel::National | ViewLevel::Municipality => {
                self.prefectures.clear();
                self.municipalities.clear();
                self.ledger.invalidate(Channel::Prefectures);
                self.ledger.invalidate(Channel::Municipalities);
                FetchRequest::AllPrefectures
            }
        };
        self.transitioned(from, "back");
        Ok(self.issue(request))
    }

    /// Jumps back to an ancestor crumb. `Ok(None)` when already there.
    pub fn navigate_to(
        &mut self,
        level: ViewLevel,
    ) -> Result<Option<FetchTicket>, NavigationError> {
        if level > self.level {
            return Err(self.reject(NavigationError::InvalidTransition {
                from: self.level,
                to: level,
            }));
        }
        let mut last = None;
        while self.level > level {
            last = Some(self.navigate_back()?);
        }
        Ok(last)
    }

    /// Closing the detail panel returns to the prefecture map.
    pub fn close_detail(&mut self) -> Result<FetchTicket, NavigationError> {
        if self.level != ViewLevel::Municipality {
            return Err(self.reject(NavigationError::NoDetailOpen));
        }
        self.navigate_back()
    }

    /// Applies a successful response if it answers the latest request.
    pub fn apply(&mut self, token: RequestToken, response: FetchResponse) -> Completion {
        let channel = response.channel();
        if !self.ledger.accept(channel, token) {
            self.stale(channel, token);
            return Completion::Stale;
        }
        match response {
            FetchResponse::Regions(rows) => self.regions = rows,
            FetchResponse::AllPrefectures(rows) => self.all_prefectures = rows,
            FetchResponse::Stats(stats) => self.stats = Some(stats),
            FetchResponse::Prefectures(rows) => self.prefectures = rows,
            FetchResponse::Municipalities(rows) => self.municipalities = rows,
            FetchResponse::Detail(detail) => self.detail = Some(*detail),
        }
        tracing::debug!(?channel, %token, "response applied");
        Completion::Applied
    }

    /// Records a failed fetch. The previous data stays in place.
    pub fn fail(
        &mut self,
        channel: Channel,
        token: RequestToken,
        error: impl std::fmt::Display,
    ) -> Completion {
        if !self.ledger.accept(channel, token) {
            self.stale(channel, token);
            return Completion::Stale;
        }
        tracing::warn!(?channel, %token, error = %error, "fetch failed");
        self.diagnostics.emit(
            DiagnosticKind::FetchFailed,
            format!("{channel:?} {token}: {error}"),
        );
        Completion::Failed
    }

    /// Logs and records a rejected navigation without changing state.
    pub fn record_rejection(&mut self, err: &NavigationError) {
        tracing::debug!(level = %self.level, error = %err, "navigation rejected");
        self.diagnostics
            .emit(DiagnosticKind::Rejected, err.to_string());
    }

    fn reject(&mut self, err: NavigationError) -> NavigationError {
        self.record_rejection(&err);
        err
    }

    fn stale(&mut self, channel: Channel, token: RequestToken) {
        tracing::debug!(?channel, %token, "stale response discarded");
        self.counters.inc(STALE_RESPONSES);
        self.diagnostics.emit(
            DiagnosticKind::StaleDiscarded,
            format!("{channel:?} {token}"),
        );
    }

    fn issue(&mut self, request: FetchRequest) -> FetchTicket {
        let token = self.ledger.issue(request.channel());
        FetchTicket { token, request }
    }

    fn transitioned(&mut self, from: ViewLevel, target: &str) {
        tracing::info!(%from, to = %self.level, target, "view level changed");
        self.diagnostics.emit(
            DiagnosticKind::Transition,
            format!("{from} -> {} ({target})", self.level),
        );
    }

    fn region_known(&self, region: &str) -> bool {
        self.regions.iter().any(|r| r.region == region)
            || self.all_prefectures.iter().any(|p| p.region == region)
    }

    fn prefecture_known(&self, prefecture: &str) -> bool {
        let Some(region) = self.selection.region() else {
            return false;
        };
        self.prefectures.iter().any(|p| p.prefecture == prefecture)
            || self
                .all_prefectures
                .iter()
                .any(|p| p.prefecture == prefecture && p.region == region)
            || self
                .regions
                .iter()
                .any(|r| r.region == region && r.prefectures.iter().any(|p| p == prefecture))
    }
}
