//! Domain vocabulary of the remote system: document types, label aliases and
//! tariff candidates. Everything here is configurable from `ticketera.toml`.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::locator::fold;

#[derive(Debug, Clone, Deserialize)]
pub struct Vocabulary {
    /// Document types offered by the remote selector, spelled as rendered.
    #[serde(default = "default_document_types")]
    pub document_types: Vec<String>,

    /// Local synonyms mapped onto a remote document type ("CI" -> "DNI").
    #[serde(default = "default_document_aliases")]
    pub document_aliases: BTreeMap<String, String>,

    /// Used when the record leaves the document type blank.
    #[serde(default = "default_document_type")]
    pub default_document_type: String,

    /// Used when the record names a type nothing maps to.
    #[serde(default = "default_fallback_document_type")]
    pub fallback_document_type: String,

    /// Alternative labels for sector and tariff names that vary between events.
    #[serde(default)]
    pub aliases: BTreeMap<String, Vec<String>>,

    /// Tried in order when a paid row names no tariff.
    #[serde(default = "default_paid_tariffs")]
    pub paid_tariffs: Vec<String>,

    /// Tried in order when a free row names no tariff.
    #[serde(default = "default_courtesy_tariffs")]
    pub courtesy_tariffs: Vec<String>,
}

fn default_document_types() -> Vec<String> {
    vec!["DNI".into(), "Pasaporte".into(), "Otro".into()]
}

fn default_document_aliases() -> BTreeMap<String, String> {
    [
        ("CI", "DNI"),
        ("Cédula", "DNI"),
        ("Cédula de identidad", "DNI"),
        ("Documento", "DNI"),
        ("Passport", "Pasaporte"),
        ("PAS", "Pasaporte"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_document_type() -> String {
    "DNI".into()
}

fn default_fallback_document_type() -> String {
    "Otro".into()
}

fn default_paid_tariffs() -> Vec<String> {
    vec!["ENTRADAS GENERALES".into(), "Fase".into(), "General".into()]
}

fn default_courtesy_tariffs() -> Vec<String> {
    vec!["Cortesía".into(), "RRPP".into(), "Buena".into()]
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            document_types: default_document_types(),
            document_aliases: default_document_aliases(),
            default_document_type: default_document_type(),
            fallback_document_type: default_fallback_document_type(),
            aliases: BTreeMap::new(),
            paid_tariffs: default_paid_tariffs(),
            courtesy_tariffs: default_courtesy_tariffs(),
        }
    }
}

impl Vocabulary {
    /// Map a record's document type onto the remote selector's vocabulary.
    pub fn normalize_document_type(&self, raw: Option<&str>) -> String {
        let folded = match raw.map(fold) {
            Some(f) if !f.is_empty() => f,
            _ => return self.default_document_type.clone(),
        };

        if let Some(known) = self.document_types.iter().find(|t| fold(t) == folded) {
            return known.clone();
        }
        self.document_aliases
            .iter()
            .find(|(alias, _)| fold(alias) == folded)
            .map(|(_, target)| target.clone())
            .unwrap_or_else(|| self.fallback_document_type.clone())
    }

    /// Configured aliases for a sector or tariff label.
    pub fn aliases_for(&self, requested: &str) -> Vec<String> {
        let folded = fold(requested);
        self.aliases
            .iter()
            .find(|(key, _)| fold(key) == folded)
            .map(|(_, alternatives)| alternatives.clone())
            .unwrap_or_default()
    }

    /// Tariff labels to try, in order. An explicit tariff always wins.
    pub fn tariff_candidates(&self, requested: Option<&str>, price: f64) -> Vec<String> {
        match requested.map(str::trim) {
            Some(t) if !t.is_empty() => vec![t.to_string()],
            _ if price > 0.0 => self.paid_tariffs.clone(),
            _ => self.courtesy_tariffs.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ci_collapses_onto_dni() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.normalize_document_type(Some("CI")), "DNI");
        assert_eq!(
            vocab.normalize_document_type(Some("CI")),
            vocab.normalize_document_type(Some("DNI"))
        );
        assert_eq!(vocab.normalize_document_type(Some("cedula")), "DNI");
    }

    #[test]
    fn blank_or_missing_defaults_to_dni() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.normalize_document_type(None), "DNI");
        assert_eq!(vocab.normalize_document_type(Some("   ")), "DNI");
    }

    #[test]
    fn known_types_keep_remote_spelling() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.normalize_document_type(Some("pasaporte")), "Pasaporte");
        assert_eq!(vocab.normalize_document_type(Some("passport")), "Pasaporte");
        assert_eq!(vocab.normalize_document_type(Some("otro")), "Otro");
    }

    #[test]
    fn unknown_type_uses_fallback() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.normalize_document_type(Some("Licencia")), "Otro");
    }

    #[test]
    fn aliases_are_looked_up_folded() {
        let mut vocab = Vocabulary::default();
        vocab
            .aliases
            .insert("Campo".into(), vec!["Campo General".into(), "Pista".into()]);
        assert_eq!(vocab.aliases_for("CAMPO"), vec!["Campo General", "Pista"]);
        assert!(vocab.aliases_for("Platea").is_empty());
    }

    #[test]
    fn tariff_candidates_follow_price() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.tariff_candidates(Some("VIP"), 0.0), vec!["VIP"]);
        assert_eq!(vocab.tariff_candidates(None, 1500.0)[0], "ENTRADAS GENERALES");
        assert_eq!(vocab.tariff_candidates(Some(""), 0.0)[0], "Cortesía");
    }

    #[test]
    fn deserializes_partial_table() {
        let vocab: Vocabulary = toml::from_str(
            r#"
            fallback_document_type = "DNI"
            [document_aliases]
            LE = "DNI"
            "#,
        )
        .unwrap();
        assert_eq!(vocab.normalize_document_type(Some("LE")), "DNI");
        assert_eq!(vocab.normalize_document_type(Some("CI")), "DNI");
        assert_eq!(vocab.default_document_type, "DNI");
    }
}
