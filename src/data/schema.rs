//! Attribute schema, feature partition and token repair table

use crate::data::Vocabulary;
use crate::error::{CkdError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a raw attribute is typed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    /// Continuous or ordinal number
    Numeric,
    /// Two-token categorical encoded to {0, 1}
    Categorical(Vocabulary),
}

/// One attribute of the raw table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub kind: AttributeKind,
}

impl Attribute {
    pub fn numeric(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: AttributeKind::Numeric,
        }
    }

    pub fn categorical(name: &str, vocabulary: Vocabulary) -> Self {
        Self {
            name: name.to_string(),
            kind: AttributeKind::Categorical(vocabulary),
        }
    }
}

/// Exact token substitution for one attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRepair {
    pub attribute: String,
    pub from: String,
    pub to: String,
    /// Set when the substitution is a known data anomaly kept as-is
    #[serde(default)]
    pub anomaly: Option<String>,
}

impl TokenRepair {
    pub fn new(attribute: &str, from: &str, to: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            anomaly: None,
        }
    }

    pub fn with_anomaly(mut self, note: &str) -> Self {
        self.anomaly = Some(note.to_string());
        self
    }
}

/// Noisy spellings recognized in every attribute that accepts them: `\t?` in
/// any column, tab or space prefixed yes/no in yes/no columns and a trailing
/// tab on the outcome
fn frame_wide_repairs(attributes: &[Attribute]) -> Vec<TokenRepair> {
    let mut repairs = Vec::new();
    for attr in attributes {
        repairs.push(TokenRepair::new(&attr.name, "\t?", "?"));
        match attr.kind {
            AttributeKind::Categorical(Vocabulary::YesNo) => {
                for (from, to) in [("\tyes", "yes"), (" yes", "yes"), ("\tno", "no")] {
                    repairs.push(TokenRepair::new(&attr.name, from, to));
                }
            }
            AttributeKind::Categorical(Vocabulary::CkdNotCkd) => {
                repairs.push(TokenRepair::new(&attr.name, "ckd\t", "ckd"));
            }
            _ => {}
        }
    }
    repairs
}

/// Ordered attribute list with its NUMERIC / CATEGORICAL / target partition.
///
/// Construction validates the partition: every non-target attribute belongs to
/// exactly one group and the group kinds agree with the attribute kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeSchema {
    attributes: Vec<Attribute>,
    numeric: Vec<String>,
    categorical: Vec<String>,
    target: String,
    repairs: Vec<TokenRepair>,
}

impl AttributeSchema {
    /// Build and validate a schema
    pub fn new(
        attributes: Vec<Attribute>,
        numeric: Vec<String>,
        categorical: Vec<String>,
        target: &str,
    ) -> Result<Self> {
        let schema = Self {
            attributes,
            numeric,
            categorical,
            target: target.to_string(),
            repairs: Vec::new(),
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Add token repairs; every repair must name a known attribute
    pub fn with_repairs(mut self, repairs: Vec<TokenRepair>) -> Result<Self> {
        for repair in &repairs {
            if self.position(&repair.attribute).is_none() {
                return Err(CkdError::SchemaError(format!(
                    "repair rule targets unknown attribute '{}'",
                    repair.attribute
                )));
            }
        }
        self.repairs = repairs;
        Ok(self)
    }

    /// The 25-attribute chronic kidney disease table.
    ///
    /// The raw file has no header; attributes appear in this order with the
    /// outcome last.
    pub fn chronic_kidney_disease() -> Result<Self> {
        use Vocabulary::*;

        let attributes = vec![
            Attribute::numeric("Age (yrs)"),
            Attribute::numeric("Blood Pressure (mm/Hg)"),
            Attribute::numeric("Specific Gravity"),
            Attribute::numeric("Albumin"),
            Attribute::numeric("Sugar"),
            Attribute::categorical("Red Blood Cells", NormalAbnormal),
            Attribute::categorical("Pus Cells", NormalAbnormal),
            Attribute::categorical("Pus Cell Clumps", PresentNotPresent),
            Attribute::categorical("Bacteria", PresentNotPresent),
            Attribute::numeric("Blood Glucose Random (mgs/dL)"),
            Attribute::numeric("Blood Urea (mgs/dL)"),
            Attribute::numeric("Serum Creatinine (mgs/dL)"),
            Attribute::numeric("Sodium (mEq/L)"),
            Attribute::numeric("Potassium (mEq/L)"),
            Attribute::numeric("Hemoglobin (gms)"),
            Attribute::numeric("Packed Cell Volume"),
            Attribute::numeric("White Blood Cells (cells/cmm)"),
            Attribute::numeric("Red Blood Cells (millions/cmm)"),
            Attribute::categorical("Hypertension", YesNo),
            Attribute::categorical("Diabetes Mellitus", YesNo),
            Attribute::categorical("Coronary Artery Disease", YesNo),
            Attribute::categorical("Appetite", GoodPoor),
            Attribute::categorical("Pedal Edema", YesNo),
            Attribute::categorical("Anemia", YesNo),
            Attribute::categorical("Chronic Kidney Disease", CkdNotCkd),
        ];

        let numeric = [
            "Age (yrs)",
            "Specific Gravity",
            "Albumin",
            "Sugar",
            "Blood Pressure (mm/Hg)",
            "Blood Glucose Random (mgs/dL)",
            "Blood Urea (mgs/dL)",
            "Serum Creatinine (mgs/dL)",
            "Sodium (mEq/L)",
            "Potassium (mEq/L)",
            "Hemoglobin (gms)",
            "Packed Cell Volume",
            "White Blood Cells (cells/cmm)",
            "Red Blood Cells (millions/cmm)",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let categorical = [
            "Red Blood Cells",
            "Pus Cells",
            "Pus Cell Clumps",
            "Bacteria",
            "Hypertension",
            "Diabetes Mellitus",
            "Coronary Artery Disease",
            "Appetite",
            "Pedal Edema",
            "Anemia",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let mut repairs = frame_wide_repairs(&attributes);
        repairs.extend([
            TokenRepair::new("Packed Cell Volume", "\t43", "43"),
            TokenRepair::new("White Blood Cells (cells/cmm)", "\t6200", "6200"),
            TokenRepair::new("White Blood Cells (cells/cmm)", "\t8400", "6200")
                .with_anomaly("'\\t8400' is rewritten to 6200, not 8400"),
        ]);

        Self::new(attributes, numeric, categorical, "Chronic Kidney Disease")?
            .with_repairs(repairs)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for attr in &self.attributes {
            if !seen.insert(attr.name.as_str()) {
                return Err(CkdError::SchemaError(format!(
                    "duplicate attribute '{}'",
                    attr.name
                )));
            }
        }

        match self.attribute(&self.target) {
            Some(Attribute {
                kind: AttributeKind::Categorical(_),
                ..
            }) => {}
            Some(_) => {
                return Err(CkdError::SchemaError(format!(
                    "target '{}' must be categorical",
                    self.target
                )))
            }
            None => {
                return Err(CkdError::SchemaError(format!(
                    "target '{}' is not an attribute",
                    self.target
                )))
            }
        }

        let mut assigned: HashSet<&str> = HashSet::new();
        for (group, names, numeric) in [
            ("NUMERIC", &self.numeric, true),
            ("CATEGORICAL", &self.categorical, false),
        ] {
            for name in names {
                let attr = self.attribute(name).ok_or_else(|| {
                    CkdError::SchemaError(format!("{} lists unknown attribute '{}'", group, name))
                })?;
                if name == &self.target {
                    return Err(CkdError::SchemaError(format!(
                        "target '{}' cannot be listed in {}",
                        name, group
                    )));
                }
                if matches!(attr.kind, AttributeKind::Numeric) != numeric {
                    return Err(CkdError::SchemaError(format!(
                        "attribute '{}' in {} has kind {:?}",
                        name, group, attr.kind
                    )));
                }
                if !assigned.insert(name.as_str()) {
                    return Err(CkdError::SchemaError(format!(
                        "attribute '{}' is assigned to more than one group",
                        name
                    )));
                }
            }
        }

        let unassigned: Vec<&str> = self
            .attributes
            .iter()
            .map(|a| a.name.as_str())
            .filter(|n| *n != self.target && !assigned.contains(n))
            .collect();
        if !unassigned.is_empty() {
            return Err(CkdError::SchemaError(format!(
                "attribute(s) in neither group: {}",
                unassigned.join(", ")
            )));
        }

        Ok(())
    }

    /// Attributes in raw file order
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Raw-order index of an attribute
    pub fn position(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }

    pub fn numeric(&self) -> &[String] {
        &self.numeric
    }

    pub fn categorical(&self) -> &[String] {
        &self.categorical
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn repairs(&self) -> &[TokenRepair] {
        &self.repairs
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Number of non-target features
    pub fn n_features(&self) -> usize {
        self.numeric.len() + self.categorical.len()
    }
}
