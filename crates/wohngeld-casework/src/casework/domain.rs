use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for client case records.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier wrapper for deadline records.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DeadlineId(pub u64);

impl fmt::Display for DeadlineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Case record for a housing-benefit client.
///
/// Only the name and address core is always present; everything else is optional because
/// readiness is judged per document type rather than globally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Client {
    pub id: ClientId,

    #[serde(rename = "familienname")]
    pub last_name: String,
    #[serde(rename = "vorname")]
    pub first_name: String,
    #[serde(rename = "geburtsdatum")]
    pub birth_date: Option<NaiveDate>,
    #[serde(rename = "staatsangehoerigkeit")]
    pub nationality: Option<String>,
    #[serde(rename = "geschlecht")]
    pub gender: Option<String>,
    #[serde(rename = "familienstand")]
    pub marital_status: Option<String>,
    #[serde(rename = "erwerbsstatus")]
    pub employment_status: Option<String>,
    #[serde(rename = "geburtsname")]
    pub birth_name: Option<String>,
    #[serde(rename = "geburtsort")]
    pub birth_place: Option<String>,
    #[serde(rename = "telefon")]
    pub phone: Option<String>,
    pub email: Option<String>,

    #[serde(rename = "strasse")]
    pub street: String,
    #[serde(rename = "hausnummer")]
    pub house_number: String,
    #[serde(rename = "plz")]
    pub postal_code: String,
    #[serde(rename = "ort")]
    pub city: String,
    #[serde(rename = "bundesland")]
    pub federal_state: Option<String>,

    #[serde(rename = "wohnflaecheQm")]
    pub living_area_sqm: Option<f64>,
    #[serde(rename = "wohnverhaeltnis")]
    pub tenancy: Option<String>,
    #[serde(rename = "verwandtschaftMitVermieter")]
    pub related_to_landlord: Option<bool>,
    #[serde(rename = "mietpreisbindung")]
    pub rent_controlled: Option<bool>,
    #[serde(rename = "einzugsdatum")]
    pub moved_in_on: Option<NaiveDate>,
    #[serde(rename = "vermieterName")]
    pub landlord_name: Option<String>,

    #[serde(rename = "gesamtmiete")]
    pub total_rent: Option<f64>,
    #[serde(rename = "heizkostenEnthalten")]
    pub heating_included: Option<bool>,
    #[serde(rename = "heizkosten")]
    pub heating_cost: Option<f64>,
    #[serde(rename = "warmwasserEnthalten")]
    pub hot_water_included: Option<bool>,
    #[serde(rename = "warmwasserkosten")]
    pub hot_water_cost: Option<f64>,

    #[serde(rename = "einkommensart")]
    pub income_type: Option<String>,
    #[serde(rename = "einkommenBrutto")]
    pub gross_income: Option<f64>,
    #[serde(rename = "einkommenTurnus")]
    pub income_frequency: Option<String>,
    #[serde(rename = "zahltKrankenPflegeversicherung")]
    pub pays_health_care_insurance: Option<bool>,

    pub iban: Option<String>,
    #[serde(rename = "bankName")]
    pub bank_name: Option<String>,
    #[serde(rename = "kontoinhaberName")]
    pub account_holder: Option<String>,
    #[serde(rename = "kontoinhaberAnschrift")]
    pub account_holder_address: Option<String>,

    #[serde(rename = "schwerbehinderungOderPflege")]
    pub disability_or_care: Option<bool>,
    #[serde(rename = "pflegegrad")]
    pub care_level: Option<String>,
    #[serde(rename = "wohngeldnummer")]
    pub benefit_number: Option<String>,
    #[serde(rename = "notizen")]
    pub notes: Option<String>,
    #[serde(rename = "aktiv", default = "active_by_default")]
    pub active: bool,

    #[serde(rename = "erstelltAm")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(rename = "aktualisiertAm")]
    pub updated_at: Option<NaiveDateTime>,
}

fn active_by_default() -> bool {
    true
}

impl Client {
    pub fn new(id: ClientId, last_name: impl Into<String>, first_name: impl Into<String>) -> Self {
        Self {
            id,
            last_name: last_name.into(),
            first_name: first_name.into(),
            active: true,
            ..Self::default()
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

/// Deadline categories with stable wire values.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum DeadlineKind {
    #[serde(rename = "WOHNGELD_ERSTANTRAG")]
    FirstApplication,
    #[serde(rename = "WOHNGELD_WEITERBEWILLIGUNG")]
    Renewal,
    #[serde(rename = "WOHNGELD_ERHOEHUNG")]
    Increase,
    #[serde(rename = "DOKUMENT_NACHREICHEN")]
    DocumentResubmission,
    #[serde(rename = "SONSTIGE")]
    Other,
}

impl DeadlineKind {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::FirstApplication,
            Self::Renewal,
            Self::Increase,
            Self::DocumentResubmission,
            Self::Other,
        ]
    }

    pub const fn wire_value(self) -> &'static str {
        match self {
            Self::FirstApplication => "WOHNGELD_ERSTANTRAG",
            Self::Renewal => "WOHNGELD_WEITERBEWILLIGUNG",
            Self::Increase => "WOHNGELD_ERHOEHUNG",
            Self::DocumentResubmission => "DOKUMENT_NACHREICHEN",
            Self::Other => "SONSTIGE",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::FirstApplication => "Erstantrag",
            Self::Renewal => "Weiterbewilligung",
            Self::Increase => "Erhöhung",
            Self::DocumentResubmission => "Dokument",
            Self::Other => "Sonstige",
        }
    }

    /// Kinds whose completion warrants scheduling the next occurrence.
    pub const fn is_renewal_class(self) -> bool {
        matches!(
            self,
            Self::FirstApplication | Self::Renewal | Self::Increase
        )
    }
}

impl fmt::Display for DeadlineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_value())
    }
}

impl FromStr for DeadlineKind {
    type Err = InvalidKind;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_uppercase();
        Self::ordered()
            .into_iter()
            .find(|kind| kind.wire_value() == normalized)
            .ok_or_else(|| InvalidKind(raw.to_string()))
    }
}

/// Lifecycle status of a deadline with stable wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeadlineStatus {
    #[serde(rename = "OFFEN")]
    Open,
    #[serde(rename = "ERINNERUNG")]
    Reminder,
    #[serde(rename = "IN_BEARBEITUNG")]
    InProgress,
    #[serde(rename = "ERLEDIGT")]
    Completed,
    #[serde(rename = "UEBERFAELLIG")]
    Overdue,
}

impl DeadlineStatus {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::Open,
            Self::Reminder,
            Self::InProgress,
            Self::Completed,
            Self::Overdue,
        ]
    }

    /// Statuses the scheduled sweep still has to look at.
    pub const fn pending() -> [Self; 3] {
        [Self::Open, Self::Reminder, Self::InProgress]
    }

    pub const fn wire_value(self) -> &'static str {
        match self {
            Self::Open => "OFFEN",
            Self::Reminder => "ERINNERUNG",
            Self::InProgress => "IN_BEARBEITUNG",
            Self::Completed => "ERLEDIGT",
            Self::Overdue => "UEBERFAELLIG",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Open => "Offen",
            Self::Reminder => "Erinnerung",
            Self::InProgress => "In Bearbeitung",
            Self::Completed => "Erledigt",
            Self::Overdue => "Überfällig",
        }
    }

    /// Targets an operator may request explicitly. `Overdue` is only ever set by the clock.
    pub const fn is_operator_target(self) -> bool {
        !matches!(self, Self::Overdue)
    }
}

impl fmt::Display for DeadlineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_value())
    }
}

impl FromStr for DeadlineStatus {
    type Err = InvalidStatus;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_uppercase();
        Self::ordered()
            .into_iter()
            .find(|status| status.wire_value() == normalized)
            .ok_or_else(|| InvalidStatus(raw.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown deadline status '{0}'")]
pub struct InvalidStatus(pub String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown deadline type '{0}'")]
pub struct InvalidKind(pub String);

/// Statutory deadline attached to a client.
///
/// A completed deadline is never mutated again; reopening or renewing produces a new record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deadline {
    pub id: DeadlineId,
    #[serde(rename = "klientId")]
    pub client_id: ClientId,
    #[serde(rename = "typ")]
    pub kind: DeadlineKind,
    #[serde(rename = "faelligAm")]
    pub due_date: NaiveDate,
    #[serde(rename = "erinnerungAm", default, skip_serializing_if = "Option::is_none")]
    pub reminder_date: Option<NaiveDate>,
    pub status: DeadlineStatus,
    #[serde(rename = "beschreibung", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        rename = "generierterAntragPfad",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub draft_path: Option<String>,
    #[serde(rename = "erstelltAm")]
    pub created_at: NaiveDateTime,
    #[serde(rename = "erledigtAm", default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub version: u64,
}

impl Deadline {
    pub fn is_completed(&self) -> bool {
        self.status == DeadlineStatus::Completed
    }
}

/// Insert payload handed to the deadline store; the store assigns id and version.
///
/// Uses the same wire names as [`Deadline`], so exported deadlines can be loaded as seed data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDeadline {
    #[serde(rename = "klientId")]
    pub client_id: ClientId,
    #[serde(rename = "typ")]
    pub kind: DeadlineKind,
    #[serde(rename = "faelligAm")]
    pub due_date: NaiveDate,
    #[serde(rename = "erinnerungAm", default, skip_serializing_if = "Option::is_none")]
    pub reminder_date: Option<NaiveDate>,
    pub status: DeadlineStatus,
    #[serde(rename = "beschreibung", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "erstelltAm")]
    pub created_at: NaiveDateTime,
}
