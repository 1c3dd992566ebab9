use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FlamaError;

/// Fixed set of support departments. Each department partitions the
/// knowledge base, attendant routing, and conversation context.
///
/// Serializes as its display label so persisted sessions and chat logs
/// stay readable by the admin surface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Department {
    #[serde(rename = "Secretaria Acadêmica")]
    Academic,
    #[serde(rename = "Financeiro")]
    Financial,
    #[serde(rename = "Suporte Técnico")]
    Support,
    #[serde(rename = "Admissões e Matrículas")]
    Admissions,
    #[serde(rename = "Informações Gerais")]
    General,
}

impl Department {
    /// All departments, in the order they are presented to the user.
    pub const ALL: [Department; 5] = [
        Department::Academic,
        Department::Financial,
        Department::Support,
        Department::Admissions,
        Department::General,
    ];

    /// Display label (pt-BR), also the persisted form.
    pub fn label(&self) -> &'static str {
        match self {
            Department::Academic => "Secretaria Acadêmica",
            Department::Financial => "Financeiro",
            Department::Support => "Suporte Técnico",
            Department::Admissions => "Admissões e Matrículas",
            Department::General => "Informações Gerais",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Department {
    type Err = FlamaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Department::ALL
            .into_iter()
            .find(|d| d.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| FlamaError::Config(format!("Unknown department: {s}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn label_round_trips_through_serde() {
        for dept in Department::ALL {
            let json = serde_json::to_string(&dept).unwrap();
            assert_eq!(json, format!("\"{}\"", dept.label()));
            let back: Department = serde_json::from_str(&json).unwrap();
            assert_eq!(back, dept);
        }
    }

    #[test]
    fn from_str_matches_labels() {
        let dept: Department = "Financeiro".parse().unwrap();
        assert_eq!(dept, Department::Financial);
        assert!("Diretoria".parse::<Department>().is_err());
    }
}
