//! Report domain types.
//!
//! Closed enumerations used by submissions, moderation and aggregation, plus
//! the [`Reporter`] value that carries reporter contact data.
//!
//! ## Anonymity
//!
//! A [`Reporter`] can only be built through [`Reporter::new`], which clears
//! every contact field when the report is anonymous. Both the validation layer
//! and the storage layer construct reporters this way, so an anonymous report
//! can never carry a name, email or phone number.
//!
//! ```
//! use huella_core::report::Reporter;
//!
//! let reporter = Reporter::new(
//!     true,
//!     Some("Ana".to_string()),
//!     Some("ana@example.com".to_string()),
//!     None,
//! );
//! assert!(reporter.name().is_none());
//! assert!(reporter.email().is_none());
//! assert_eq!(reporter.visible_name(), "Anonymous");
//! ```

use serde::{Deserialize, Serialize};

/// Label used when a reporter chose anonymity or gave no name.
pub const ANONYMOUS_LABEL: &str = "Anonymous";

/// Kind of animal that was attacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimalType {
    /// Domestic dog.
    Dog,
    /// Cat.
    Cat,
    /// Any other animal.
    Other,
}

impl AnimalType {
    /// All variants, in display order.
    pub const ALL: [AnimalType; 3] = [AnimalType::Dog, AnimalType::Cat, AnimalType::Other];

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dog => "dog",
            Self::Cat => "cat",
            Self::Other => "other",
        }
    }

    /// Parse from database string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "dog" => Some(Self::Dog),
            "cat" => Some(Self::Cat),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Dog => "Domestic dog",
            Self::Cat => "Cat",
            Self::Other => "Other animal",
        }
    }
}

/// Severity of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    /// All variants, least severe first.
    pub const ALL: [Severity; 3] = [Severity::Mild, Severity::Moderate, Severity::Severe];

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mild => "mild",
            Self::Moderate => "moderate",
            Self::Severe => "severe",
        }
    }

    /// Parse from database string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mild" => Some(Self::Mild),
            "moderate" => Some(Self::Moderate),
            "severe" => Some(Self::Severe),
            _ => None,
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Mild => "Mild",
            Self::Moderate => "Moderate",
            Self::Severe => "Severe",
        }
    }
}

/// Named city district a report can be filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    Centro,
    LasAnimas,
    Collico,
    ParqueSaval,
    IslaTeja,
    LosPelues,
    Angachilla,
    Niebla,
    Other,
}

impl Sector {
    /// All variants, in the order they are offered on the submission form.
    pub const ALL: [Sector; 9] = [
        Sector::Centro,
        Sector::LasAnimas,
        Sector::Collico,
        Sector::ParqueSaval,
        Sector::IslaTeja,
        Sector::LosPelues,
        Sector::Angachilla,
        Sector::Niebla,
        Sector::Other,
    ];

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Centro => "centro",
            Self::LasAnimas => "las_animas",
            Self::Collico => "collico",
            Self::ParqueSaval => "parque_saval",
            Self::IslaTeja => "isla_teja",
            Self::LosPelues => "los_pelues",
            Self::Angachilla => "angachilla",
            Self::Niebla => "niebla",
            Self::Other => "other",
        }
    }

    /// Parse from database string.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|sector| sector.as_str() == s)
    }

    /// District name as shown to residents.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Centro => "Centro",
            Self::LasAnimas => "Las Ánimas",
            Self::Collico => "Collico",
            Self::ParqueSaval => "Parque Saval",
            Self::IslaTeja => "Isla Teja",
            Self::LosPelues => "Los Pelúes",
            Self::Angachilla => "Angachilla",
            Self::Niebla => "Niebla",
            Self::Other => "Other",
        }
    }
}

/// Moderation state of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportState {
    /// Awaiting review. Initial state.
    #[default]
    Pending,
    /// Published on the map and in statistics.
    Approved,
    /// Rejected by a moderator.
    Rejected,
}

impl ReportState {
    pub const ALL: [ReportState; 3] = [
        ReportState::Pending,
        ReportState::Approved,
        ReportState::Rejected,
    ];

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parse from database string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }
}

impl std::fmt::Display for ReportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Moderation sub-state of a single photo.
///
/// Independent of the owning report's [`ReportState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoState {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl PhotoState {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parse from database string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Action recorded in the moderation audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogAction {
    /// Report was verified and approved.
    Verified,
    /// Report was rejected.
    Rejected,
    /// Internal moderator note.
    Comment,
}

impl LogAction {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Rejected => "rejected",
            Self::Comment => "comment",
        }
    }

    /// Parse from database string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "verified" => Some(Self::Verified),
            "rejected" => Some(Self::Rejected),
            "comment" => Some(Self::Comment),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Verified => "Verified",
            Self::Rejected => "Rejected",
            Self::Comment => "Internal comment",
        }
    }
}

/// A point selected on the map, stored with six decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    /// Decimal places kept for coordinates.
    pub const PRECISION: i32 = 6;

    /// Creates a location, rounding both coordinates to [`Location::PRECISION`].
    ///
    /// Returns `None` when a coordinate is out of range or not finite.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return None;
        }

        let scale = 10f64.powi(Self::PRECISION);
        Some(Self {
            latitude: (latitude * scale).round() / scale,
            longitude: (longitude * scale).round() / scale,
        })
    }

    /// `(0, 0)` is what the map widget submits when nothing was selected.
    pub fn is_unset(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }
}

/// Reporter contact data attached to a report.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Reporter {
    anonymous: bool,
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
}

impl Reporter {
    /// Creates reporter data, dropping every contact field when `anonymous`.
    ///
    /// Blank values are normalized to `None`.
    pub fn new(
        anonymous: bool,
        name: Option<String>,
        email: Option<String>,
        phone: Option<String>,
    ) -> Self {
        if anonymous {
            return Self {
                anonymous: true,
                name: None,
                email: None,
                phone: None,
            };
        }

        Self {
            anonymous: false,
            name: non_blank(name),
            email: non_blank(email),
            phone: non_blank(phone),
        }
    }

    /// An anonymous reporter.
    pub fn anonymous() -> Self {
        Self::new(true, None, None, None)
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    /// Name shown publicly: the reporter name, or [`ANONYMOUS_LABEL`].
    pub fn visible_name(&self) -> &str {
        if self.anonymous {
            return ANONYMOUS_LABEL;
        }
        self.name.as_deref().unwrap_or(ANONYMOUS_LABEL)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_round_trip_through_db_strings() {
        for animal in AnimalType::ALL {
            assert_eq!(AnimalType::parse(animal.as_str()), Some(animal));
        }
        for severity in Severity::ALL {
            assert_eq!(Severity::parse(severity.as_str()), Some(severity));
        }
        for sector in Sector::ALL {
            assert_eq!(Sector::parse(sector.as_str()), Some(sector));
        }
        for state in ReportState::ALL {
            assert_eq!(ReportState::parse(state.as_str()), Some(state));
        }
    }

    #[test]
    fn test_unknown_values_do_not_parse() {
        assert_eq!(AnimalType::parse("perro"), None);
        assert_eq!(Severity::parse("grave"), None);
        assert_eq!(Sector::parse(""), None);
        assert_eq!(ReportState::parse("PENDING"), None);
        assert_eq!(LogAction::parse("deleted"), None);
    }

    #[test]
    fn test_sector_labels() {
        assert_eq!(Sector::LasAnimas.label(), "Las Ánimas");
        assert_eq!(Sector::LosPelues.label(), "Los Pelúes");
        assert_eq!(Sector::ParqueSaval.label(), "Parque Saval");
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&Sector::IslaTeja).unwrap();
        assert_eq!(json, "\"isla_teja\"");

        let state: ReportState = serde_json::from_str("\"approved\"").unwrap();
        assert_eq!(state, ReportState::Approved);
    }

    #[test]
    fn test_location_rounds_to_six_places() {
        let location = Location::new(-39.8142871, -73.2458993).unwrap();
        assert_eq!(location.latitude, -39.814287);
        assert_eq!(location.longitude, -73.245899);
        assert!(!location.is_unset());
    }

    #[test]
    fn test_location_rejects_out_of_range() {
        assert!(Location::new(90.5, 0.0).is_none());
        assert!(Location::new(0.0, -180.1).is_none());
        assert!(Location::new(f64::NAN, 0.0).is_none());
        assert!(Location::new(0.0, 0.0).unwrap().is_unset());
    }

    #[test]
    fn test_anonymous_reporter_drops_contact_data() {
        let reporter = Reporter::new(
            true,
            Some("Juan Pérez".to_string()),
            Some("juan@example.com".to_string()),
            Some("+56 9 1234 5678".to_string()),
        );

        assert!(reporter.is_anonymous());
        assert_eq!(reporter.name(), None);
        assert_eq!(reporter.email(), None);
        assert_eq!(reporter.phone(), None);
        assert_eq!(reporter.visible_name(), ANONYMOUS_LABEL);
    }

    #[test]
    fn test_named_reporter_keeps_contact_data() {
        let reporter = Reporter::new(
            false,
            Some("  Juan Pérez ".to_string()),
            Some("juan@example.com".to_string()),
            Some("   ".to_string()),
        );

        assert_eq!(reporter.name(), Some("Juan Pérez"));
        assert_eq!(reporter.email(), Some("juan@example.com"));
        assert_eq!(reporter.phone(), None);
        assert_eq!(reporter.visible_name(), "Juan Pérez");
    }

    #[test]
    fn test_visible_name_without_name() {
        let reporter = Reporter::new(false, None, Some("a@b.cl".to_string()), None);
        assert_eq!(reporter.visible_name(), ANONYMOUS_LABEL);
    }
}
