//! Omaha protocol types and constants.
//!
//! This module defines the wire model exchanged between a simulated
//! instance and the update service: one `<request>` carrying exactly one
//! `<app>` entry, answered by one `<response>`.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use updatectl_common::{MachineId, SessionId};

use crate::errors::ProtocolError;

/// Omaha protocol version
pub const PROTOCOL_VERSION: &str = "3.0";

/// Updater identity reported in `version` and `updaterversion`
pub const UPDATER_VERSION: &str = "CoreOSUpdateEngine-0.1.0.0";

/// Operating system version reported in the `<os>` element
pub const OS_VERSION: &str = "lsb";

/// Operating system platform reported in the `<os>` element
pub const OS_PLATFORM: &str = "CoreOS";

/// Error code attached to every failed event
pub const EVENT_ERROR_CODE: &str = "2000";

/// Days since the last report, sent in every heartbeat
pub const PING_LAST_REPORT_DAYS: u32 = 1;

/// Status sent in every heartbeat
pub const PING_STATUS: u32 = 1;

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

// ============================================================================
// Event codes
// ============================================================================

/// Omaha event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Update complete (also used for "installed" and failure reports)
    UpdateComplete,
    /// Download started
    DownloadStarted,
    /// Download finished
    DownloadFinished,
}

impl EventType {
    /// Numeric wire code
    pub fn code(self) -> u32 {
        match self {
            EventType::UpdateComplete => 3,
            EventType::DownloadStarted => 13,
            EventType::DownloadFinished => 14,
        }
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.code())
    }
}

/// Omaha event result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventResult {
    Error,
    Success,
    /// Success, reboot required
    SuccessReboot,
}

impl EventResult {
    /// Numeric wire code
    pub fn code(self) -> u32 {
        match self {
            EventResult::Error => 0,
            EventResult::Success => 1,
            EventResult::SuccessReboot => 2,
        }
    }

    pub fn is_error(self) -> bool {
        self == EventResult::Error
    }
}

impl Serialize for EventResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.code())
    }
}

/// A (type, result) pair reported to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Event {
    pub event_type: EventType,
    pub result: EventResult,
}

impl Event {
    /// "downloading/success"
    pub const DOWNLOADING: Event = Event::new(EventType::DownloadStarted, EventResult::Success);
    /// "downloaded/success"
    pub const DOWNLOADED: Event = Event::new(EventType::DownloadFinished, EventResult::Success);
    /// "installed/success"
    pub const INSTALLED: Event = Event::new(EventType::UpdateComplete, EventResult::Success);
    /// "completed/success"
    pub const COMPLETED: Event = Event::new(EventType::UpdateComplete, EventResult::SuccessReboot);
    /// "completed/error"
    pub const FAILED: Event = Event::new(EventType::UpdateComplete, EventResult::Error);

    pub const fn new(event_type: EventType, result: EventResult) -> Self {
        Self { event_type, result }
    }

    /// Error code sent alongside this event (empty unless the result is an error)
    pub fn error_code(&self) -> &'static str {
        if self.result.is_error() {
            EVENT_ERROR_CODE
        } else {
            ""
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.event_type.code(), self.result.code())
    }
}

// ============================================================================
// Request
// ============================================================================

/// Source that triggered the update check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstallSource {
    /// Regular scheduled check
    #[default]
    Scheduler,
    /// User-forced update, bypasses server-side rate limiting
    OnDemandUpdate,
}

impl InstallSource {
    pub fn for_force_update(force_update: bool) -> Self {
        if force_update {
            InstallSource::OnDemandUpdate
        } else {
            InstallSource::Scheduler
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InstallSource::Scheduler => "scheduler",
            InstallSource::OnDemandUpdate => "ondemandupdate",
        }
    }
}

impl Serialize for InstallSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Top-level `<request>` element
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename = "request")]
pub struct Request {
    #[serde(rename = "@protocol")]
    pub protocol: String,
    #[serde(rename = "@version")]
    pub version: String,
    #[serde(rename = "@updaterversion")]
    pub updater_version: String,
    #[serde(rename = "@installsource")]
    pub install_source: InstallSource,
    #[serde(rename = "@ismachine")]
    pub is_machine: u32,
    pub os: Os,
    pub app: AppRequest,
}

impl Request {
    /// Create a request for a single app
    pub fn new(install_source: InstallSource, app: AppRequest) -> Self {
        Self {
            protocol: PROTOCOL_VERSION.to_string(),
            version: UPDATER_VERSION.to_string(),
            updater_version: UPDATER_VERSION.to_string(),
            install_source,
            is_machine: 1,
            os: Os::default(),
            app,
        }
    }

    /// Whether this request asks for an update
    pub fn is_update_check(&self) -> bool {
        self.app.update_check.is_some()
    }

    /// Whether this request is a heartbeat
    pub fn is_ping(&self) -> bool {
        self.app.ping.is_some()
    }

    /// Event carried by this request, if any
    pub fn event(&self) -> Option<Event> {
        self.app.event.as_ref().map(EventElement::event)
    }
}

/// `<os>` element
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Os {
    #[serde(rename = "@version")]
    pub version: String,
    #[serde(rename = "@platform")]
    pub platform: String,
    #[serde(rename = "@sp")]
    pub service_pack: String,
    #[serde(rename = "@arch")]
    pub arch: String,
}

impl Default for Os {
    fn default() -> Self {
        Self {
            version: OS_VERSION.to_string(),
            platform: OS_PLATFORM.to_string(),
            service_pack: String::new(),
            arch: String::new(),
        }
    }
}

/// `<app>` element of a request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppRequest {
    #[serde(rename = "@appid")]
    pub app_id: String,
    #[serde(rename = "@version")]
    pub version: String,
    #[serde(rename = "@track")]
    pub track: String,
    #[serde(rename = "@bootid")]
    pub boot_id: String,
    #[serde(rename = "@oem")]
    pub oem: String,
    #[serde(rename = "@machineid")]
    pub machine_id: String,
    #[serde(rename = "updatecheck", skip_serializing_if = "Option::is_none")]
    pub update_check: Option<UpdateCheckRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ping: Option<Ping>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<EventElement>,
}

impl AppRequest {
    pub fn new(
        app_id: impl Into<String>,
        version: impl Into<String>,
        track: impl Into<String>,
        oem: impl Into<String>,
        machine_id: &MachineId,
        session_id: &SessionId,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            version: version.into(),
            track: track.into(),
            boot_id: session_id.to_string(),
            oem: oem.into(),
            machine_id: machine_id.to_string(),
            update_check: None,
            ping: None,
            event: None,
        }
    }

    pub fn with_update_check(mut self) -> Self {
        self.update_check = Some(UpdateCheckRequest {});
        self
    }

    pub fn with_ping(mut self) -> Self {
        self.ping = Some(Ping::default());
        self
    }

    pub fn with_event(mut self, event: Event) -> Self {
        self.event = Some(EventElement::from(event));
        self
    }
}

/// Empty `<updatecheck/>` marker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateCheckRequest {}

/// `<ping>` heartbeat element
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ping {
    #[serde(rename = "@r")]
    pub last_report_days: u32,
    #[serde(rename = "@status")]
    pub status: u32,
}

impl Default for Ping {
    fn default() -> Self {
        Self {
            last_report_days: PING_LAST_REPORT_DAYS,
            status: PING_STATUS,
        }
    }
}

/// `<event>` element
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventElement {
    #[serde(rename = "@eventtype")]
    pub event_type: EventType,
    #[serde(rename = "@eventresult")]
    pub result: EventResult,
    #[serde(rename = "@errorcode")]
    pub error_code: String,
}

impl EventElement {
    pub fn event(&self) -> Event {
        Event::new(self.event_type, self.result)
    }
}

impl From<Event> for EventElement {
    fn from(event: Event) -> Self {
        Self {
            event_type: event.event_type,
            result: event.result,
            error_code: event.error_code().to_string(),
        }
    }
}

// ============================================================================
// Response
// ============================================================================

/// Top-level `<response>` element
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename = "response")]
pub struct Response {
    #[serde(rename = "@protocol", default)]
    pub protocol: String,
    #[serde(rename = "@server", default)]
    pub server: String,
    #[serde(rename = "app", default)]
    pub apps: Vec<AppResponse>,
}

impl Response {
    /// Response offering `version` of `app_id`
    pub fn update_available(
        app_id: impl Into<String>,
        version: impl Into<String>,
        package_name: impl Into<String>,
    ) -> Self {
        Self::with_update_check(
            app_id,
            UpdateCheckResponse {
                status: "ok".to_string(),
                urls: None,
                manifest: Some(Manifest {
                    version: version.into(),
                    packages: Some(Packages {
                        packages: vec![Package {
                            name: package_name.into(),
                            ..Package::default()
                        }],
                    }),
                }),
            },
        )
    }

    /// Response with no update offered
    pub fn no_update(app_id: impl Into<String>) -> Self {
        Self::with_status(app_id, "noupdate")
    }

    /// Response with an arbitrary update-check status and no manifest
    pub fn with_status(app_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self::with_update_check(
            app_id,
            UpdateCheckResponse {
                status: status.into(),
                urls: None,
                manifest: None,
            },
        )
    }

    fn with_update_check(app_id: impl Into<String>, update_check: UpdateCheckResponse) -> Self {
        Self {
            protocol: PROTOCOL_VERSION.to_string(),
            server: String::new(),
            apps: vec![AppResponse {
                app_id: app_id.into(),
                status: Some("ok".to_string()),
                update_check: Some(update_check),
            }],
        }
    }

    /// Update-check result of the first (only) app
    pub fn update_check(&self) -> Result<&UpdateCheckResponse, ProtocolError> {
        self.apps
            .first()
            .and_then(|app| app.update_check.as_ref())
            .ok_or(ProtocolError::MissingApp)
    }
}

/// `<app>` element of a response
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppResponse {
    #[serde(rename = "@appid", default)]
    pub app_id: String,
    #[serde(rename = "@status", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "updatecheck", default, skip_serializing_if = "Option::is_none")]
    pub update_check: Option<UpdateCheckResponse>,
}

/// `<updatecheck>` element of a response
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateCheckResponse {
    #[serde(rename = "@status", default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<Urls>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<Manifest>,
}

impl UpdateCheckResponse {
    pub fn status(&self) -> UpdateStatus {
        UpdateStatus::from(self.status.as_str())
    }

    /// Offered version, present only when a manifest was sent
    pub fn manifest_version(&self) -> Option<&str> {
        self.manifest
            .as_ref()
            .map(|m| m.version.as_str())
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Urls {
    #[serde(rename = "url", default)]
    pub urls: Vec<Url>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Url {
    #[serde(rename = "@codebase", default)]
    pub codebase: String,
}

/// `<manifest>` describing the offered version
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "@version", default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages: Option<Packages>,
}

impl Manifest {
    /// Name of the first package, if any
    pub fn package_name(&self) -> Option<&str> {
        self.packages
            .as_ref()
            .and_then(|p| p.packages.first())
            .map(|p| p.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Packages {
    #[serde(rename = "package", default)]
    pub packages: Vec<Package>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Package {
    #[serde(rename = "@name", default)]
    pub name: String,
    #[serde(rename = "@hash", default)]
    pub hash: String,
    #[serde(rename = "@size", default)]
    pub size: String,
    #[serde(rename = "@required", default)]
    pub required: String,
}

/// Parsed update-check status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    /// An update is offered
    Ok,
    /// Already up to date
    NoUpdate,
    /// `error-*` or any status this client does not recognise
    Error(String),
}

impl From<&str> for UpdateStatus {
    fn from(status: &str) -> Self {
        match status {
            "ok" => UpdateStatus::Ok,
            "noupdate" => UpdateStatus::NoUpdate,
            other => UpdateStatus::Error(other.to_string()),
        }
    }
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateStatus::Ok => write!(f, "ok"),
            UpdateStatus::NoUpdate => write!(f, "noupdate"),
            UpdateStatus::Error(status) => write!(f, "{}", status),
        }
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Serialize a request to an indented XML document
pub fn encode_request(request: &Request) -> Result<String, ProtocolError> {
    encode(request)
}

/// Serialize a response to an indented XML document
pub fn encode_response(response: &Response) -> Result<String, ProtocolError> {
    encode(response)
}

fn encode<T: Serialize>(value: &T) -> Result<String, ProtocolError> {
    let mut body = String::from(XML_DECLARATION);
    let mut serializer = quick_xml::se::Serializer::new(&mut body);
    serializer.indent(' ', 1);
    value
        .serialize(serializer)
        .map_err(|e| ProtocolError::Serialization(e.to_string()))?;
    Ok(body)
}

/// Parse a response document
pub fn decode_response(body: &str) -> Result<Response, ProtocolError> {
    quick_xml::de::from_str(body).map_err(|e| ProtocolError::InvalidMessage(e.to_string()))
}
