//! Phase vocabulary
//!
//! The ordered list of positions a work order (and each of its furniture
//! items) moves through, from the first site measurement to payment.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// Position in the production lifecycle
///
/// Serialized with the labels used by the workshop, which are also the
/// labels shown to the user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum Phase {
    #[default]
    #[serde(rename = "Misure")]
    Measurements,
    #[serde(rename = "Progetto")]
    Design,
    #[serde(rename = "Preventivo")]
    Quote,
    #[serde(rename = "Preventivo confermato")]
    QuoteConfirmed,
    #[serde(rename = "Ordine materiale")]
    MaterialOrdered,
    #[serde(rename = "In lavorazione")]
    InProduction,
    #[serde(rename = "Materiale pronto")]
    MaterialReady,
    #[serde(rename = "Posato")]
    Installed,
    #[serde(rename = "Da completare")]
    ToComplete,
    #[serde(rename = "Finito")]
    Finished,
    #[serde(rename = "Pagato")]
    Paid,
}

/// Number of phases a furniture item can be in (everything but `Pagato`)
pub const ITEM_STAGE_COUNT: usize = 10;

/// Labels accepted from older data and what they now mean
static LEGACY_LABELS: LazyLock<HashMap<&'static str, Phase>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    map.insert("Da avviare", Phase::Measurements);
    map.insert("Nuovo", Phase::Measurements);
    map.insert("Materiale ordinato", Phase::MaterialOrdered);
    map.insert("Ordine materiali", Phase::MaterialOrdered);
    map.insert("Materiale consegnato", Phase::MaterialOrdered);
    map.insert("In verniciatura", Phase::InProduction);
    map.insert("Pronto", Phase::MaterialReady);
    map.insert("Programmato posa", Phase::MaterialReady);
    map
});

impl Phase {
    pub const ALL: [Phase; 11] = [
        Phase::Measurements,
        Phase::Design,
        Phase::Quote,
        Phase::QuoteConfirmed,
        Phase::MaterialOrdered,
        Phase::InProduction,
        Phase::MaterialReady,
        Phase::Installed,
        Phase::ToComplete,
        Phase::Finished,
        Phase::Paid,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Measurements => "Misure",
            Self::Design => "Progetto",
            Self::Quote => "Preventivo",
            Self::QuoteConfirmed => "Preventivo confermato",
            Self::MaterialOrdered => "Ordine materiale",
            Self::InProduction => "In lavorazione",
            Self::MaterialReady => "Materiale pronto",
            Self::Installed => "Posato",
            Self::ToComplete => "Da completare",
            Self::Finished => "Finito",
            Self::Paid => "Pagato",
        }
    }

    /// Zero-based position in the vocabulary
    pub fn index(&self) -> usize {
        Self::ALL
            .iter()
            .position(|phase| phase == self)
            .unwrap_or_default()
    }

    /// Exact vocabulary label lookup
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|phase| phase.label() == label)
    }

    /// Resolve a stored label, remapping legacy names.
    ///
    /// Anything unrecognized lands on the first phase.
    pub fn normalize(label: &str) -> Self {
        let label = label.trim();
        Self::from_label(label)
            .or_else(|| LEGACY_LABELS.get(label).copied())
            .unwrap_or_default()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid)
    }

    /// Furniture items stop at `Finito`
    pub fn clamp_for_item(self) -> Self {
        if self.is_terminal() {
            Self::Finished
        } else {
            self
        }
    }

    /// Phases a furniture item may take
    pub fn item_phases() -> &'static [Phase] {
        &Self::ALL[..ITEM_STAGE_COUNT]
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown phase: {0}")]
pub struct ParsePhaseError(pub String);

impl FromStr for Phase {
    type Err = ParsePhaseError;

    /// Case-insensitive match on current or legacy labels
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|phase| phase.label().to_lowercase() == wanted)
            .or_else(|| {
                LEGACY_LABELS
                    .iter()
                    .find(|(label, _)| label.to_lowercase() == wanted)
                    .map(|(_, phase)| *phase)
            })
            .ok_or_else(|| ParsePhaseError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_order() {
        assert_eq!(Phase::Measurements.index(), 0);
        assert_eq!(Phase::Finished.index(), 9);
        assert_eq!(Phase::Paid.index(), 10);
        assert_eq!(Phase::item_phases().len(), ITEM_STAGE_COUNT);
        assert!(!Phase::item_phases().contains(&Phase::Paid));
    }

    #[test]
    fn test_normalize_legacy_labels() {
        assert_eq!(Phase::normalize("Da avviare"), Phase::Measurements);
        assert_eq!(Phase::normalize("Materiale ordinato"), Phase::MaterialOrdered);
        assert_eq!(Phase::normalize("Pronto"), Phase::MaterialReady);
        assert_eq!(Phase::normalize("In verniciatura"), Phase::InProduction);
        assert_eq!(Phase::normalize("Posato"), Phase::Installed);
    }

    #[test]
    fn test_normalize_unknown_falls_back_to_first() {
        assert_eq!(Phase::normalize("Boh"), Phase::Measurements);
        assert_eq!(Phase::normalize(""), Phase::Measurements);
    }

    #[test]
    fn test_serde_uses_labels() {
        let json = serde_json::to_string(&Phase::QuoteConfirmed).unwrap();
        assert_eq!(json, "\"Preventivo confermato\"");
        let phase: Phase = serde_json::from_str("\"In lavorazione\"").unwrap();
        assert_eq!(phase, Phase::InProduction);
    }

    #[test]
    fn test_from_str_is_case_insensitive() {
        assert_eq!("materiale pronto".parse::<Phase>(), Ok(Phase::MaterialReady));
        assert_eq!("pronto".parse::<Phase>(), Ok(Phase::MaterialReady));
        assert!("nope".parse::<Phase>().is_err());
    }

    #[test]
    fn test_clamp_for_item() {
        assert_eq!(Phase::Paid.clamp_for_item(), Phase::Finished);
        assert_eq!(Phase::Design.clamp_for_item(), Phase::Design);
    }
}
