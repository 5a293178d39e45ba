//! Ontology Registry
//!
//! Static catalog mapping data-field names to business metadata. Column names alone
//! do not tell a language model that `CSCORE_B` is a borrower FICO score or that
//! `DLQ_STATUS = '00'` means current, so the registry supplies that vocabulary.
//!
//! The registry is built once at startup (from the embedded loan ontology or a JSON
//! file) and is immutable afterwards; share it through `Arc`.

use crate::error::{ConverSqlError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use tracing::info;

const BUILTIN_LOAN_ONTOLOGY: &str = include_str!("../data/loan_ontology.json");

/// Business category a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BusinessDomain {
    Identification,
    Temporal,
    #[serde(rename = "Loan Terms")]
    LoanTerms,
    #[serde(rename = "Unpaid Balances")]
    UnpaidBalances,
    #[serde(rename = "Borrower Profile")]
    BorrowerProfile,
    #[serde(rename = "Property Info")]
    PropertyInfo,
    #[serde(rename = "LTV Ratios")]
    LtvRatios,
    #[serde(rename = "Payment Status")]
    PaymentStatus,
    #[serde(rename = "Principal Payments")]
    PrincipalPayments,
    #[serde(rename = "Foreclosure Costs")]
    ForeclosureCosts,
    #[serde(rename = "Property Disposition")]
    PropertyDisposition,
    #[serde(rename = "Mortgage Insurance")]
    MortgageInsurance,
    #[serde(rename = "Modifications & Losses")]
    ModificationsLosses,
    #[serde(rename = "ARM Features")]
    ArmFeatures,
    #[serde(rename = "Special Indicators")]
    SpecialIndicators,
}

impl BusinessDomain {
    pub fn label(&self) -> &'static str {
        match self {
            BusinessDomain::Identification => "Identification",
            BusinessDomain::Temporal => "Temporal",
            BusinessDomain::LoanTerms => "Loan Terms",
            BusinessDomain::UnpaidBalances => "Unpaid Balances",
            BusinessDomain::BorrowerProfile => "Borrower Profile",
            BusinessDomain::PropertyInfo => "Property Info",
            BusinessDomain::LtvRatios => "LTV Ratios",
            BusinessDomain::PaymentStatus => "Payment Status",
            BusinessDomain::PrincipalPayments => "Principal Payments",
            BusinessDomain::ForeclosureCosts => "Foreclosure Costs",
            BusinessDomain::PropertyDisposition => "Property Disposition",
            BusinessDomain::MortgageInsurance => "Mortgage Insurance",
            BusinessDomain::ModificationsLosses => "Modifications & Losses",
            BusinessDomain::ArmFeatures => "ARM Features",
            BusinessDomain::SpecialIndicators => "Special Indicators",
        }
    }
}

impl fmt::Display for BusinessDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Business metadata for one schema column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMetadata {
    /// Column name, unique across the whole registry
    pub name: String,

    pub description: String,

    pub domain: BusinessDomain,

    /// Declared type tag (e.g. VARCHAR, SMALLINT, DOUBLE)
    pub data_type: String,

    /// Real-world meaning of the field
    pub business_context: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_impact: Option<String>,

    /// Enumerated value codes and their meaning
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, String>,

    /// Related field names, informational only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculation: Option<String>,
}

/// Named grouping of fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntologyDomain {
    pub name: String,
    pub category: BusinessDomain,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    pub fields: Vec<FieldMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioOverview {
    pub description: String,
    pub coverage: String,
    pub vintage_range: String,
    pub geographic_scope: String,
    pub update_frequency: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskFramework {
    pub credit_triangle: String,
    #[serde(default)]
    pub risk_tiers: BTreeMap<String, String>,
}

/// Dataset-level facts rendered in front of the table definitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioContext {
    pub overview: PortfolioOverview,
    #[serde(default)]
    pub performance_summary: BTreeMap<String, String>,
    pub risk_framework: RiskFramework,
    #[serde(default)]
    pub analytical_dimensions: Vec<String>,
    #[serde(default)]
    pub key_relationships: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OntologyDocument {
    name: String,
    domains: Vec<OntologyDomain>,
    #[serde(default)]
    portfolio: Option<PortfolioContext>,
}

/// Read-only field lookup over a validated set of domains.
#[derive(Debug, Clone)]
pub struct OntologyRegistry {
    name: String,
    domains: Vec<OntologyDomain>,
    portfolio: Option<PortfolioContext>,
    /// field name -> (domain index, field index)
    index: HashMap<String, (usize, usize)>,
}

impl OntologyRegistry {
    /// Single-family loan performance ontology shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_LOAN_ONTOLOGY)
    }

    /// Load an ontology document from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConverSqlError::Ontology(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let registry = Self::from_json_str(&content)?;
        info!(
            "Loaded ontology '{}' from {} ({} fields)",
            registry.name,
            path.display(),
            registry.len()
        );
        Ok(registry)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: OntologyDocument = serde_json::from_str(json)
            .map_err(|e| ConverSqlError::Ontology(format!("Invalid ontology document: {}", e)))?;
        Self::from_domains(document.name, document.domains, document.portfolio)
    }

    /// Build a registry, rejecting cross-domain name collisions and mislabelled fields.
    pub fn from_domains(
        name: impl Into<String>,
        domains: Vec<OntologyDomain>,
        portfolio: Option<PortfolioContext>,
    ) -> Result<Self> {
        let mut index: HashMap<String, (usize, usize)> = HashMap::new();

        for (d, domain) in domains.iter().enumerate() {
            for (f, field) in domain.fields.iter().enumerate() {
                if field.domain != domain.category {
                    return Err(ConverSqlError::Ontology(format!(
                        "Field {} is tagged '{}' but listed under domain {} ({})",
                        field.name, field.domain, domain.name, domain.category
                    )));
                }
                if let Some((previous, _)) = index.insert(field.name.clone(), (d, f)) {
                    return Err(ConverSqlError::Ontology(format!(
                        "Field {} is defined in both {} and {}",
                        field.name, domains[previous].name, domain.name
                    )));
                }
            }
        }

        for domain in &domains {
            if let Some(pk) = &domain.primary_key {
                if !index.contains_key(pk) {
                    return Err(ConverSqlError::Ontology(format!(
                        "Primary key {} of domain {} is not a known field",
                        pk, domain.name
                    )));
                }
            }
        }

        Ok(Self {
            name: name.into(),
            domains,
            portfolio,
            index,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Exact, case-sensitive lookup. `None` is the normal "not in the ontology" answer.
    pub fn get_field(&self, name: &str) -> Option<&FieldMetadata> {
        self.index
            .get(name)
            .map(|&(d, f)| &self.domains[d].fields[f])
    }

    /// Domain that owns `name`, if any.
    pub fn domain_of(&self, name: &str) -> Option<&OntologyDomain> {
        self.index.get(name).map(|&(d, _)| &self.domains[d])
    }

    /// Domains in definition order.
    pub fn all_domains(&self) -> &[OntologyDomain] {
        &self.domains
    }

    pub fn portfolio(&self) -> Option<&PortfolioContext> {
        self.portfolio.as_ref()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.domains
            .iter()
            .flat_map(|d| d.fields.iter().map(|f| f.name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, domain: BusinessDomain) -> FieldMetadata {
        FieldMetadata {
            name: name.to_string(),
            description: format!("{} description", name),
            domain,
            data_type: "VARCHAR".to_string(),
            business_context: "context".to_string(),
            risk_impact: None,
            values: BTreeMap::new(),
            relationships: Vec::new(),
            calculation: None,
        }
    }

    fn domain(name: &str, category: BusinessDomain, fields: Vec<FieldMetadata>) -> OntologyDomain {
        OntologyDomain {
            name: name.to_string(),
            category,
            description: format!("{} fields", name),
            primary_key: None,
            fields,
        }
    }

    #[test]
    fn builtin_ontology_loads_every_domain() {
        let registry = OntologyRegistry::builtin().unwrap();
        assert_eq!(registry.all_domains().len(), 15);
        assert_eq!(registry.len(), 110);
        assert_eq!(registry.all_domains()[0].name, "IDENTIFICATION");
        assert_eq!(
            registry.all_domains()[0].primary_key.as_deref(),
            Some("LOAN_ID")
        );
        assert!(registry.portfolio().is_some());
    }

    #[test]
    fn builtin_lookup_is_exact_and_case_sensitive() {
        let registry = OntologyRegistry::builtin().unwrap();
        let score = registry.get_field("CSCORE_B").unwrap();
        assert_eq!(score.domain, BusinessDomain::BorrowerProfile);
        assert!(!score.values.is_empty());
        assert!(registry.get_field("cscore_b").is_none());
        assert!(registry.get_field("NOT_A_FIELD").is_none());
    }

    #[test]
    fn duplicate_field_across_domains_is_rejected() {
        let result = OntologyRegistry::from_domains(
            "dup",
            vec![
                domain("IDS", BusinessDomain::Identification, vec![field("LOAN_ID", BusinessDomain::Identification)]),
                domain("TIME", BusinessDomain::Temporal, vec![field("LOAN_ID", BusinessDomain::Temporal)]),
            ],
            None,
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains("LOAN_ID"));
        assert!(err.contains("IDS") && err.contains("TIME"));
    }

    #[test]
    fn field_tagged_with_wrong_domain_is_rejected() {
        let result = OntologyRegistry::from_domains(
            "bad",
            vec![domain("IDS", BusinessDomain::Identification, vec![field("ORIG_DATE", BusinessDomain::Temporal)])],
            None,
        );
        assert!(matches!(result, Err(ConverSqlError::Ontology(_))));
    }

    #[test]
    fn unknown_primary_key_is_rejected() {
        let mut ids = domain("IDS", BusinessDomain::Identification, vec![field("POOL_ID", BusinessDomain::Identification)]);
        ids.primary_key = Some("LOAN_ID".to_string());
        assert!(OntologyRegistry::from_domains("pk", vec![ids], None).is_err());
    }

    #[test]
    fn unknown_category_fails_to_parse() {
        let json = r#"{"name":"x","domains":[{"name":"A","category":"Astrology","description":"d","fields":[]}]}"#;
        assert!(matches!(
            OntologyRegistry::from_json_str(json),
            Err(ConverSqlError::Ontology(_))
        ));
    }

    #[test]
    fn load_reads_document_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ontology.json");
        std::fs::write(
            &path,
            r#"{"name":"mini","domains":[{"name":"IDS","category":"Identification","description":"ids",
                "primary_key":"LOAN_ID","fields":[{"name":"LOAN_ID","description":"Loan id",
                "domain":"Identification","data_type":"VARCHAR","business_context":"Primary key"}]}]}"#,
        )
        .unwrap();

        let registry = OntologyRegistry::load(&path).unwrap();
        assert_eq!(registry.name(), "mini");
        assert_eq!(registry.field_names().collect::<Vec<_>>(), vec!["LOAN_ID"]);
        assert_eq!(registry.domain_of("LOAN_ID").unwrap().name, "IDS");
        assert!(registry.portfolio().is_none());
    }
}
