//! Per-year column mappings and value rules
//!
//! Each supported survey year is described by a [`YearProfile`]: a rename
//! map, a drop set and the text substitutions needed to bring that year's
//! spellings in line. Profiles are plain data; supporting a new year means
//! adding a profile (in code or in a JSON file), not a new branch.

use crate::error::{LagwatchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Exact-value substitution in one canonical column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRule {
    pub column: String,
    pub from: String,
    pub to: String,
}

impl ValueRule {
    pub fn new(column: &str, from: &str, to: &str) -> Self {
        Self {
            column: column.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Substring replacement applied to phase labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextReplacement {
    pub from: String,
    pub to: String,
}

/// Phase-label normalization: substitutions, then leading-integer extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRule {
    pub column: String,
    pub replacements: Vec<TextReplacement>,
    /// Regex whose first capture group holds the phase number
    #[serde(default = "default_phase_pattern")]
    pub pattern: String,
}

fn default_phase_pattern() -> String {
    r"^(\d+)".to_string()
}

impl Default for PhaseRule {
    fn default() -> Self {
        Self {
            column: super::PHASE_COLUMN.to_string(),
            replacements: vec![
                TextReplacement { from: "ALFA".to_string(), to: "0".to_string() },
                TextReplacement { from: "FASE ".to_string(), to: String::new() },
            ],
            pattern: default_phase_pattern(),
        }
    }
}

/// Configuration bundle for one source year
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearProfile {
    pub year: u16,
    /// Raw column name -> canonical name
    #[serde(default)]
    pub renames: BTreeMap<String, String>,
    /// Columns removed after renaming
    #[serde(default)]
    pub drops: BTreeSet<String>,
    #[serde(default)]
    pub value_rules: Vec<ValueRule>,
    #[serde(default)]
    pub phase: Option<PhaseRule>,
}

impl YearProfile {
    /// Create an empty profile for a year
    pub fn new(year: u16) -> Self {
        Self {
            year,
            renames: BTreeMap::new(),
            drops: BTreeSet::new(),
            value_rules: Vec::new(),
            phase: None,
        }
    }

    /// Add raw -> canonical renames
    pub fn with_renames<'a>(mut self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        self.renames
            .extend(pairs.into_iter().map(|(raw, canon)| (raw.to_string(), canon.to_string())));
        self
    }

    /// Add columns to drop
    pub fn with_drops<'a>(mut self, columns: impl IntoIterator<Item = &'a str>) -> Self {
        self.drops.extend(columns.into_iter().map(str::to_string));
        self
    }

    /// Add exact-value substitutions
    pub fn with_value_rules(mut self, rules: impl IntoIterator<Item = ValueRule>) -> Self {
        self.value_rules.extend(rules);
        self
    }

    /// Set the phase-label rule
    pub fn with_phase(mut self, rule: PhaseRule) -> Self {
        self.phase = Some(rule);
        self
    }

    /// Canonical name for a raw column; unmapped names pass through
    pub fn canonical_name<'a>(&'a self, raw: &'a str) -> &'a str {
        self.renames.get(raw).map(String::as_str).unwrap_or(raw)
    }
}

/// Variant spellings shared by every year
fn shared_value_rules() -> Vec<ValueRule> {
    vec![
        ValueRule::new("gender", "Menina", "Feminino"),
        ValueRule::new("gender", "Menino", "Masculino"),
        ValueRule::new("education_institution", "Escola Pública", "Pública"),
        ValueRule::new(
            "education_institution",
            "Privada - Programa de apadrinhamento",
            "Privada - Programa de Apadrinhamento",
        ),
        ValueRule::new("stone", "Agata", "Ágata"),
        ValueRule::new("stone", "Topazio", "Topázio"),
    ]
}

/// Evaluator columns and per-round flags with no analytical use
const EVALUATION_NOISE: &[&str] = &[
    "Nº Av",
    "Avaliador1",
    "Avaliador2",
    "Avaliador3",
    "Avaliador4",
    "Avaliador5",
    "Avaliador6",
    "Rec Av1",
    "Rec Av2",
    "Rec Av3",
    "Rec Av4",
    "Rec Psicologia",
    "Destaque IEG",
    "Destaque IDA",
    "Destaque IPV",
    "Indicado",
    "Atingiu PV",
    "Cg",
    "Cf",
    "Ct",
];

fn profile_2022() -> YearProfile {
    YearProfile::new(2022)
        .with_renames([
            ("RA", "ra"),
            ("Fase", "fase"),
            ("Turma", "class_group"),
            ("Nome", "name"),
            ("Ano nasc", "birth_year"),
            ("Idade 22", "age"),
            ("Gênero", "gender"),
            ("Ano ingresso", "entry_year"),
            ("Instituição de ensino", "education_institution"),
            ("Pedra 22", "stone"),
            ("INDE 22", "inde"),
            ("IAA", "iaa"),
            ("IEG", "ieg"),
            ("IPS", "ips"),
            ("IDA", "ida"),
            ("Matem", "math"),
            ("Portug", "portuguese"),
            ("Inglês", "english"),
            ("IPV", "ipv"),
            ("IAN", "ian"),
            ("Fase ideal", "ideal_phase"),
            ("Defas", "lag_current"),
        ])
        .with_drops(EVALUATION_NOISE.iter().copied())
        .with_drops(["name", "Pedra 20", "Pedra 21"])
        .with_value_rules(shared_value_rules())
        .with_phase(PhaseRule::default())
}

fn profile_2023() -> YearProfile {
    YearProfile::new(2023)
        .with_renames([
            ("RA", "ra"),
            ("Fase", "fase"),
            ("Turma", "class_group"),
            ("Nome Anonimizado", "name"),
            ("Data de Nasc", "birth_date"),
            ("Idade", "age"),
            ("Gênero", "gender"),
            ("Ano ingresso", "entry_year"),
            ("Instituição de ensino", "education_institution"),
            ("Pedra 2023", "stone"),
            ("INDE 2023", "inde"),
            ("IAA", "iaa"),
            ("IEG", "ieg"),
            ("IPS", "ips"),
            ("IDA", "ida"),
            ("Mat", "math"),
            ("Por", "portuguese"),
            ("Ing", "english"),
            ("IPV", "ipv"),
            ("IAN", "ian"),
            ("Fase Ideal", "ideal_phase"),
            ("Defasagem", "lag_current"),
        ])
        .with_drops(EVALUATION_NOISE.iter().copied())
        .with_drops(["name", "Pedra 20", "Pedra 21", "Pedra 22", "INDE 22", "IPP"])
        .with_value_rules(shared_value_rules())
        .with_phase(PhaseRule::default())
}

fn profile_2024() -> YearProfile {
    YearProfile::new(2024)
        .with_renames([
            ("RA", "ra"),
            ("Fase", "fase"),
            ("Turma", "class_group"),
            ("Nome Anonimizado", "name"),
            ("Data de Nasc", "birth_date"),
            ("Idade", "age"),
            ("Gênero", "gender"),
            ("Ano ingresso", "entry_year"),
            ("Instituição de ensino", "education_institution"),
            ("Pedra 2024", "stone"),
            ("INDE 2024", "inde"),
            ("IAA", "iaa"),
            ("IEG", "ieg"),
            ("IPS", "ips"),
            ("IDA", "ida"),
            ("Mat", "math"),
            ("Por", "portuguese"),
            ("Ing", "english"),
            ("IPV", "ipv"),
            ("IAN", "ian"),
            ("Fase Ideal", "ideal_phase"),
            ("Defasagem", "lag_current"),
        ])
        .with_drops(EVALUATION_NOISE.iter().copied())
        .with_drops([
            "name",
            "Pedra 20",
            "Pedra 21",
            "Pedra 22",
            "Pedra 23",
            "Pedra 2023",
            "INDE 22",
            "INDE 23",
            "INDE 2023",
            "IPP",
            "Escola",
            "Ativo/ Inativo",
        ])
        .with_value_rules(shared_value_rules())
        .with_phase(PhaseRule::default())
}

/// Year-keyed table of profiles
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileRegistry {
    profiles: BTreeMap<u16, YearProfile>,
}

impl ProfileRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the 2022, 2023 and 2024 survey profiles
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.insert(profile_2022());
        registry.insert(profile_2023());
        registry.insert(profile_2024());
        registry
    }

    /// Add or replace the profile for its year
    pub fn insert(&mut self, profile: YearProfile) {
        self.profiles.insert(profile.year, profile);
    }

    /// Profile for a year
    pub fn get(&self, year: u16) -> Result<&YearProfile> {
        self.profiles.get(&year).ok_or_else(|| {
            LagwatchError::ConfigError(format!("no column profile registered for year {}", year))
        })
    }

    /// Years with a registered profile, ascending
    pub fn years(&self) -> Vec<u16> {
        self.profiles.keys().copied().collect()
    }

    /// Built-in profiles overlaid with those in a JSON file (an array of profiles)
    pub fn with_json_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let profiles: Vec<YearProfile> = serde_json::from_str(&json)?;
        for profile in profiles {
            tracing::debug!(year = profile.year, "loaded column profile from file");
            self.insert(profile);
        }
        Ok(self)
    }
}
