//! Pin numbering translation
//!
//! Scratch addresses pins either by GPIO index (0-7) or by physical header
//! pin number. WebIOPi only understands BCM numbering, so every client
//! identifier is translated here before it reaches the device service.

use serde::Deserialize;

/// Raspberry Pi board revision
///
/// Revision 2 boards moved BCM 21 to BCM 27 on header pin 13.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "RevisionTag")]
pub enum Revision {
    Rev1,
    #[default]
    Rev2,
}

/// Revision as written in the config file (`revision: 2` or `revision: "2"`)
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RevisionTag {
    Numeric(u32),
    Named(String),
}

impl Revision {
    /// Any tag other than "2" selects revision 1
    pub fn from_tag(tag: &str) -> Self {
        if tag.trim() == "2" {
            Revision::Rev2
        } else {
            Revision::Rev1
        }
    }

    /// BCM id wired to GPIO index 2 / header pin 13
    fn split_pin(self) -> &'static str {
        match self {
            Revision::Rev1 => "21",
            Revision::Rev2 => "27",
        }
    }
}

impl From<RevisionTag> for Revision {
    fn from(tag: RevisionTag) -> Self {
        match tag {
            RevisionTag::Numeric(n) => Revision::from_tag(&n.to_string()),
            RevisionTag::Named(s) => Revision::from_tag(&s),
        }
    }
}

/// Client-facing numbering scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinScheme {
    /// Scratch GPIO index 0-7
    Gpio,
    /// Physical header pin number
    Header,
}

/// GPIO indices in report order
pub const GPIO_INDICES: [&str; 8] = ["0", "1", "2", "3", "4", "5", "6", "7"];

/// Header pins in report order
pub const HEADER_PINS: [&str; 8] = ["7", "11", "12", "13", "15", "16", "18", "22"];

/// Translate a client identifier into the BCM id used by WebIOPi
///
/// Returns `None` for identifiers outside the fixed tables.
pub fn to_canonical(scheme: PinScheme, id: &str, revision: Revision) -> Option<&'static str> {
    let bcm = match (scheme, id) {
        (PinScheme::Gpio, "0") | (PinScheme::Header, "11") => "17",
        (PinScheme::Gpio, "1") | (PinScheme::Header, "12") => "18",
        (PinScheme::Gpio, "2") | (PinScheme::Header, "13") => revision.split_pin(),
        (PinScheme::Gpio, "3") | (PinScheme::Header, "15") => "22",
        (PinScheme::Gpio, "4") | (PinScheme::Header, "16") => "23",
        (PinScheme::Gpio, "5") | (PinScheme::Header, "18") => "24",
        (PinScheme::Gpio, "6") | (PinScheme::Header, "22") => "25",
        (PinScheme::Gpio, "7") | (PinScheme::Header, "7") => "4",
        _ => return None,
    };
    Some(bcm)
}

/// Which field of a pin a report line shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportField {
    /// Value as `true`/`false`
    BoolValue,
    /// Value exactly as the device reported it
    RawValue,
    /// Function token
    Function,
}

/// One line of the poll report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub name: String,
    pub bcm: &'static str,
    pub field: ReportField,
}

/// Build the fixed, ordered list of 32 reporter names for a revision
///
/// Order: GPIO values, header pin values, header pin functions, GPIO functions.
pub fn report_lines(revision: Revision) -> Vec<ReportLine> {
    let groups = [
        (PinScheme::Gpio, &GPIO_INDICES, "gpio", "", ReportField::BoolValue),
        (PinScheme::Header, &HEADER_PINS, "pin", "", ReportField::RawValue),
        (PinScheme::Header, &HEADER_PINS, "pin", "fn", ReportField::Function),
        (PinScheme::Gpio, &GPIO_INDICES, "gpio", "fn", ReportField::Function),
    ];

    groups
        .iter()
        .flat_map(|(scheme, ids, prefix, suffix, field)| {
            ids.iter().filter_map(move |id| {
                to_canonical(*scheme, id, revision).map(|bcm| ReportLine {
                    name: format!("{prefix}{id}{suffix}"),
                    bcm,
                    field: *field,
                })
            })
        })
        .collect()
}
