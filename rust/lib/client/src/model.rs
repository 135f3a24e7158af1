//! Records exchanged with the system service.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// `{ "data": ..., "msg": ... }` wrapper used by every system endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl<T> Envelope<T> {
    pub fn new(data: T) -> Self {
        Self { data, msg: None }
    }
}

// ── Account ─────────────────────────────────────────────────────────

/// The logged-in user's account record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// 0 (admin) through 5.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_level: Option<u8>,
    /// Remaining profile fields, kept as sent.
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl Account {
    pub fn is_admin(&self) -> bool {
        self.access_level == Some(0)
    }
}

/// Per-account preferences. Free-form on the server side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountSettings(pub Map<String, Value>);

impl AccountSettings {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

// ── Inventory ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lab {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(alias = "lab_name")]
    pub name: String,
    #[serde(default)]
    pub location: String,
}

/// Hardware slots tracked on every computer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Monitor,
    SystemUnit,
    Keyboard,
    Mouse,
    Headphone,
    Hdmi,
    Power,
    Wifi,
}

impl Part {
    pub const ALL: [Part; 8] = [
        Part::Monitor,
        Part::SystemUnit,
        Part::Keyboard,
        Part::Mouse,
        Part::Headphone,
        Part::Hdmi,
        Part::Power,
        Part::Wifi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Part::Monitor => "monitor",
            Part::SystemUnit => "systemUnit",
            Part::Keyboard => "keyboard",
            Part::Mouse => "mouse",
            Part::Headphone => "headphone",
            Part::Hdmi => "hdmi",
            Part::Power => "power",
            Part::Wifi => "wifi",
        }
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Part {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.replace(['-', '_'], "").to_ascii_lowercase();
        Part::ALL
            .into_iter()
            .find(|p| p.as_str().to_ascii_lowercase() == wanted)
            .ok_or_else(|| format!("unknown part: {s}"))
    }
}

/// Condition of a part, ordered from best to worst.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PartStatus {
    #[default]
    Operational,
    NotOperational,
    Damaged,
    Missing,
}

impl PartStatus {
    /// Most severe of `statuses`; operational when empty.
    pub fn worst(statuses: impl IntoIterator<Item = PartStatus>) -> PartStatus {
        statuses.into_iter().max().unwrap_or_default()
    }

    pub fn label(&self) -> &'static str {
        match self {
            PartStatus::Operational => "Operational",
            PartStatus::NotOperational => "Not Operational",
            PartStatus::Damaged => "Damaged",
            PartStatus::Missing => "Missing",
        }
    }
}

impl fmt::Display for PartStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PartStatus {
    type Err = String;

    /// Accepts the dashboard's spellings: `notOperational`, `Notoperational`,
    /// `Not Operational`, `Warning` for a part that still works badly, and
    /// `Damage` as sent by the report form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "operational" | "ok" => Ok(PartStatus::Operational),
            "notoperational" | "warning" => Ok(PartStatus::NotOperational),
            "damaged" | "damage" => Ok(PartStatus::Damaged),
            "missing" => Ok(PartStatus::Missing),
            _ => Err(format!("unknown status: {s}")),
        }
    }
}

impl<'de> Deserialize<'de> for PartStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Status field of a listed record. Values outside the known spellings
/// (`Pending`, free text) read as `None` so one row cannot fail a list.
fn lenient_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<PartStatus>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| match s.parse() {
        Ok(status) => Some(status),
        Err(e) => {
            debug!("ignoring {}", e);
            None
        }
    }))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Computer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// PC number within the lab.
    pub name: String,
    #[serde(alias = "lab")]
    pub lab_name: String,
    /// Asset label or description per part.
    #[serde(default)]
    pub parts: BTreeMap<Part, String>,
}

/// Current status of each part of one computer. Parts without an entry are
/// operational.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartStatuses {
    pub com_id: i64,
    #[serde(default, deserialize_with = "lenient_status", skip_serializing_if = "Option::is_none")]
    pub monitor: Option<PartStatus>,
    #[serde(
        default,
        rename = "systemUnit",
        deserialize_with = "lenient_status",
        skip_serializing_if = "Option::is_none"
    )]
    pub system_unit: Option<PartStatus>,
    #[serde(default, deserialize_with = "lenient_status", skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<PartStatus>,
    #[serde(default, deserialize_with = "lenient_status", skip_serializing_if = "Option::is_none")]
    pub mouse: Option<PartStatus>,
    #[serde(default, deserialize_with = "lenient_status", skip_serializing_if = "Option::is_none")]
    pub headphone: Option<PartStatus>,
    #[serde(default, deserialize_with = "lenient_status", skip_serializing_if = "Option::is_none")]
    pub hdmi: Option<PartStatus>,
    #[serde(default, deserialize_with = "lenient_status", skip_serializing_if = "Option::is_none")]
    pub power: Option<PartStatus>,
    #[serde(default, deserialize_with = "lenient_status", skip_serializing_if = "Option::is_none")]
    pub wifi: Option<PartStatus>,
}

impl PartStatuses {
    pub fn new(com_id: i64) -> Self {
        Self { com_id, ..Default::default() }
    }

    fn slot(&mut self, part: Part) -> &mut Option<PartStatus> {
        match part {
            Part::Monitor => &mut self.monitor,
            Part::SystemUnit => &mut self.system_unit,
            Part::Keyboard => &mut self.keyboard,
            Part::Mouse => &mut self.mouse,
            Part::Headphone => &mut self.headphone,
            Part::Hdmi => &mut self.hdmi,
            Part::Power => &mut self.power,
            Part::Wifi => &mut self.wifi,
        }
    }

    pub fn get(&self, part: Part) -> PartStatus {
        let status = match part {
            Part::Monitor => self.monitor,
            Part::SystemUnit => self.system_unit,
            Part::Keyboard => self.keyboard,
            Part::Mouse => self.mouse,
            Part::Headphone => self.headphone,
            Part::Hdmi => self.hdmi,
            Part::Power => self.power,
            Part::Wifi => self.wifi,
        };
        status.unwrap_or_default()
    }

    pub fn set(&mut self, part: Part, status: PartStatus) {
        *self.slot(part) = Some(status);
    }

    /// The computer's overall condition: its worst part.
    pub fn overall(&self) -> PartStatus {
        PartStatus::worst(Part::ALL.into_iter().map(|p| self.get(p)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartStatusUpdate {
    pub part: Part,
    pub status: PartStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Accessory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default, alias = "lab")]
    pub lab_name: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default, deserialize_with = "lenient_status", skip_serializing_if = "Option::is_none")]
    pub status: Option<PartStatus>,
}

/// Who filed a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Admin,
    Student,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Admin => "admin",
            ReportKind::Student => "student",
        }
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(ReportKind::Admin),
            "student" => Ok(ReportKind::Student),
            _ => Err(format!("unknown report kind: {s}")),
        }
    }
}

/// Incident report on a computer or accessory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// PC number or accessory name.
    pub item: String,
    #[serde(default)]
    pub lab: String,
    /// `None` when the server sent a status this client does not know.
    #[serde(default, deserialize_with = "lenient_status", skip_serializing_if = "Option::is_none")]
    pub status: Option<PartStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(deserialize_with = "trimmed")]
    pub name: String,
    pub email: String,
    /// `Admin`, `Lab Assistant`, `Faculty`, ...
    #[serde(default, deserialize_with = "trimmed")]
    pub role: String,
}

fn trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let s = Option::<String>::deserialize(deserializer)?;
    Ok(s.map(|s| s.trim().to_string()).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn worst_status_wins() {
        assert_eq!(PartStatus::worst([]), PartStatus::Operational);
        assert_eq!(
            PartStatus::worst([PartStatus::Damaged, PartStatus::NotOperational]),
            PartStatus::Damaged
        );
        assert_eq!(
            PartStatus::worst([PartStatus::Missing, PartStatus::Damaged]),
            PartStatus::Missing
        );
    }

    #[test]
    fn status_spellings() {
        for (raw, want) in [
            ("operational", PartStatus::Operational),
            ("Operational", PartStatus::Operational),
            ("notOperational", PartStatus::NotOperational),
            ("Notoperational", PartStatus::NotOperational),
            ("Not Operational", PartStatus::NotOperational),
            ("Warning", PartStatus::NotOperational),
            ("Damaged", PartStatus::Damaged),
            ("Damage", PartStatus::Damaged),
            ("missing", PartStatus::Missing),
        ] {
            assert_eq!(raw.parse::<PartStatus>().unwrap(), want, "{raw}");
        }
        assert!("broken-ish".parse::<PartStatus>().is_err());
        assert_eq!(serde_json::to_value(PartStatus::NotOperational).unwrap(), json!("notOperational"));
    }

    #[test]
    fn unknown_report_status_does_not_fail_the_list() {
        let env: Envelope<Vec<Report>> = serde_json::from_value(json!({
            "data": [
                {"item": "PC-01", "lab": "CL-1", "status": "Missing"},
                {"item": "PC-02", "lab": "CL-1", "status": "Damage"},
                {"item": "Projector", "lab": "CL-1", "status": "Pending"},
                {"item": "PC-03", "lab": "CL-1"}
            ]
        }))
        .unwrap();
        let statuses: Vec<_> = env.data.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![Some(PartStatus::Missing), Some(PartStatus::Damaged), None, None]
        );
    }

    #[test]
    fn status_row_from_server() {
        let row: PartStatuses = serde_json::from_value(json!({
            "com_id": 12,
            "monitor": "damaged",
            "systemUnit": "operational",
            "wifi": "missing",
            "mouse": "Pending"
        }))
        .unwrap();
        assert_eq!(row.get(Part::Monitor), PartStatus::Damaged);
        assert_eq!(row.get(Part::Keyboard), PartStatus::Operational);
        assert_eq!(row.mouse, None);
        assert_eq!(row.overall(), PartStatus::Missing);
    }

    #[test]
    fn set_part_status() {
        let mut row = PartStatuses::new(3);
        assert_eq!(row.overall(), PartStatus::Operational);
        row.set(Part::Hdmi, PartStatus::NotOperational);
        assert_eq!(row.get(Part::Hdmi), PartStatus::NotOperational);
        assert_eq!(row.overall(), PartStatus::NotOperational);
    }

    #[test]
    fn part_names() {
        assert_eq!("systemUnit".parse::<Part>().unwrap(), Part::SystemUnit);
        assert_eq!("system-unit".parse::<Part>().unwrap(), Part::SystemUnit);
        assert_eq!("WIFI".parse::<Part>().unwrap(), Part::Wifi);
        assert!("scanner".parse::<Part>().is_err());
    }

    #[test]
    fn lab_accepts_form_field_name() {
        let lab: Lab = serde_json::from_value(json!({"lab_name": "CL-1", "location": "2F"})).unwrap();
        assert_eq!(lab.name, "CL-1");
    }

    #[test]
    fn computer_parts_keyed_by_part() {
        let pc: Computer = serde_json::from_value(json!({
            "id": 5,
            "name": "PC-05",
            "lab": "CL-1",
            "parts": {"monitor": "MN-221", "systemUnit": "SU-17"}
        }))
        .unwrap();
        assert_eq!(pc.lab_name, "CL-1");
        assert_eq!(pc.parts.get(&Part::SystemUnit).map(String::as_str), Some("SU-17"));
    }

    #[test]
    fn user_fields_are_trimmed() {
        let user: User = serde_json::from_value(json!({
            "name": " Ana Cruz ",
            "email": "ana@school.edu",
            "role": "Lab Assistant  "
        }))
        .unwrap();
        assert_eq!(user.name, "Ana Cruz");
        assert_eq!(user.role, "Lab Assistant");
    }

    #[test]
    fn account_keeps_profile_fields() {
        let account: Account = serde_json::from_value(json!({
            "id": 1,
            "username": "admin",
            "access_level": 0,
            "first_name": "Lea"
        }))
        .unwrap();
        assert!(account.is_admin());
        assert_eq!(account.profile.get("first_name"), Some(&json!("Lea")));
    }
}
