//! Query Advisor
//!
//! Advisory review of generated SQL: statement classification through `sqlparser`
//! plus loan-analytics hints. Never rejects or rewrites a query.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::collections::HashSet;

lazy_static! {
    static ref IDENT: Regex = Regex::new(r"[A-Z_][A-Z0-9_]*").unwrap();
}

const NULLABLE_FIELDS: [&str; 4] = ["DTI", "CSCORE_C", "OLTV", "CLTV"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Alter,
    Drop,
    Truncate,
    Other,
    Unparsed,
}

impl StatementKind {
    fn of(statement: &Statement) -> Self {
        match statement {
            Statement::Query(_) => StatementKind::Select,
            Statement::Insert { .. } => StatementKind::Insert,
            Statement::Update { .. } => StatementKind::Update,
            Statement::Delete { .. } => StatementKind::Delete,
            Statement::CreateTable { .. }
            | Statement::CreateView { .. }
            | Statement::CreateIndex { .. }
            | Statement::CreateSchema { .. }
            | Statement::CreateDatabase { .. } => StatementKind::Create,
            Statement::AlterTable { .. } => StatementKind::Alter,
            Statement::Drop { .. } => StatementKind::Drop,
            Statement::Truncate { .. } => StatementKind::Truncate,
            _ => StatementKind::Other,
        }
    }

    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            StatementKind::Insert
                | StatementKind::Update
                | StatementKind::Delete
                | StatementKind::Create
                | StatementKind::Alter
                | StatementKind::Drop
                | StatementKind::Truncate
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryReview {
    pub statement: StatementKind,
    pub read_only: bool,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
    pub enhancements: Vec<String>,
}

impl QueryReview {
    fn new(statement: StatementKind, read_only: bool) -> Self {
        Self {
            statement,
            read_only,
            warnings: Vec::new(),
            suggestions: Vec::new(),
            enhancements: Vec::new(),
        }
    }
}

/// Upper-cased SQL plus the identifiers it mentions.
struct Scan {
    upper: String,
    idents: HashSet<String>,
}

impl Scan {
    fn new(sql: &str) -> Self {
        let upper = sql.to_uppercase();
        let idents = IDENT
            .find_iter(&upper)
            .map(|m| m.as_str().to_string())
            .collect();
        Self { upper, idents }
    }

    fn mentions(&self, field: &str) -> bool {
        self.idents.contains(field)
    }

    fn contains(&self, fragment: &str) -> bool {
        self.upper.contains(fragment)
    }
}

#[derive(Debug, Default, Clone)]
pub struct QueryAdvisor;

impl QueryAdvisor {
    pub fn new() -> Self {
        Self
    }

    pub fn review(&self, sql: &str) -> QueryReview {
        let mut review = match Parser::parse_sql(&GenericDialect {}, sql) {
            Ok(statements) if statements.is_empty() => {
                let mut review = QueryReview::new(StatementKind::Unparsed, true);
                review.warnings.push("No SQL statement found".to_string());
                review
            }
            Ok(statements) => {
                let kinds: Vec<StatementKind> = statements.iter().map(StatementKind::of).collect();
                let read_only = kinds.iter().all(|k| !k.is_destructive());
                let mut review = QueryReview::new(kinds[0], read_only);
                if kinds.len() > 1 {
                    review
                        .warnings
                        .push(format!("{} statements found; expected a single query", kinds.len()));
                }
                if !read_only {
                    review.warnings.push(
                        "Query modifies data or schema; only read-only SELECT queries are expected"
                            .to_string(),
                    );
                }
                review
            }
            Err(e) => {
                let mut review = QueryReview::new(StatementKind::Unparsed, true);
                review.warnings.push(format!("SQL could not be parsed: {}", e));
                review
            }
        };

        let scan = Scan::new(sql);
        check_geographic(&scan, &mut review);
        check_risk(&scan, &mut review);
        check_financial(&scan, &mut review);
        check_performance(&scan, &mut review);
        check_nulls(&scan, &mut review);
        check_aggregation(&scan, &mut review);
        review
    }

    /// Analysis-pattern hints from the wording of a question.
    pub fn suggest_for_question(&self, question: &str) -> Vec<String> {
        let lower = question.to_lowercase();
        let any = |words: &[&str]| words.iter().any(|w| lower.contains(w));
        let mut suggestions = Vec::new();

        if any(&["state", "geographic", "region", "location"]) {
            suggestions.push(
                "Geographic Analysis: Use GROUP BY STATE, consider MSA for metro areas, ZIP for regional analysis"
                    .to_string(),
            );
        }
        if any(&["risk", "credit", "score", "ltv", "dti"]) {
            suggestions.push(
                "Risk Analysis: Create tiers for CSCORE_B (740+=Super Prime), OLTV (80%=Low Risk), DTI (28%=Low Risk)"
                    .to_string(),
            );
        }
        if any(&["performance", "delinquent", "current", "default"]) {
            suggestions.push(
                "Performance Analysis: Use DLQ_STATUS for delinquency, LOAN_AGE for seasoning effects".to_string(),
            );
        }
        if any(&["top", "best", "worst", "highest", "lowest"]) {
            suggestions.push("Top N Analysis: Use ORDER BY [metric] DESC LIMIT N pattern".to_string());
        }
        suggestions
    }
}

fn check_geographic(scan: &Scan, review: &mut QueryReview) {
    if scan.mentions("STATE") && !scan.contains("GROUP BY STATE") {
        review
            .suggestions
            .push("Consider adding 'GROUP BY STATE' for state-level analysis".to_string());
    }
    if scan.mentions("ZIP") {
        review
            .enhancements
            .push("ZIP field contains only first 3 digits for privacy (e.g., '902', '100')".to_string());
    }
}

fn check_risk(scan: &Scan, review: &mut QueryReview) {
    if scan.mentions("CSCORE_B") && !scan.contains("CASE WHEN") {
        review.suggestions.push(
            "Consider creating credit score tiers: CASE WHEN CSCORE_B >= 740 THEN 'Super Prime' \
             WHEN CSCORE_B >= 680 THEN 'Prime' WHEN CSCORE_B >= 620 THEN 'Near Prime' ELSE 'Subprime' END"
                .to_string(),
        );
    }
    if scan.mentions("DTI") {
        review.enhancements.push(
            "DTI interpretation: <=28% = Low Risk, 29-36% = Moderate, 37-45% = High, >45% = Very High"
                .to_string(),
        );
    }
}

fn check_financial(scan: &Scan, review: &mut QueryReview) {
    if scan.mentions("ORIG_RATE") && scan.mentions("AVG") && !scan.mentions("ROUND") {
        review
            .suggestions
            .push("Consider rounding rates for readability: ROUND(AVG(ORIG_RATE), 2)".to_string());
    }
    if scan.mentions("ORIG_UPB") && scan.mentions("CURR_UPB") {
        review.enhancements.push(
            "Comparing ORIG_UPB vs CURR_UPB shows paydown patterns - useful for prepayment analysis"
                .to_string(),
        );
    }
}

fn check_performance(scan: &Scan, review: &mut QueryReview) {
    if scan.mentions("DLQ_STATUS") {
        review
            .enhancements
            .push("DLQ_STATUS values: '00'=Current, '01'=30-59 days, '02'=60-89 days, etc.".to_string());
    }
    if scan.mentions("LOAN_AGE") {
        review.enhancements.push(
            "LOAN_AGE is in months since origination - useful for vintage/seasoning analysis".to_string(),
        );
    }
}

fn check_nulls(scan: &Scan, review: &mut QueryReview) {
    if scan.contains("IS NOT NULL") {
        return;
    }
    for field in NULLABLE_FIELDS.iter().filter(|f| scan.mentions(f)) {
        review.warnings.push(format!(
            "{field} field commonly contains NULL values - consider filtering with 'WHERE {field} IS NOT NULL'"
        ));
    }
}

fn check_aggregation(scan: &Scan, review: &mut QueryReview) {
    if scan.contains("GROUP BY") && !scan.contains("ORDER BY") {
        review
            .suggestions
            .push("Consider adding ORDER BY clause to sort results meaningfully".to_string());
    }
    if scan.contains("COUNT(*)") && !scan.mentions("LIMIT") {
        review
            .suggestions
            .push("For top N analysis, consider adding LIMIT clause (e.g., LIMIT 10)".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_is_read_only() {
        let review = QueryAdvisor::new().review("SELECT STATE, COUNT(*) FROM data GROUP BY STATE ORDER BY 2 DESC LIMIT 10");
        assert_eq!(review.statement, StatementKind::Select);
        assert!(review.read_only);
        assert!(review.warnings.is_empty());
    }

    #[test]
    fn destructive_statements_are_flagged() {
        let advisor = QueryAdvisor::new();
        for (sql, kind) in [
            ("DELETE FROM data WHERE 1=1", StatementKind::Delete),
            ("DROP TABLE data", StatementKind::Drop),
            ("UPDATE data SET STATE = 'CA'", StatementKind::Update),
            ("INSERT INTO data VALUES (1)", StatementKind::Insert),
        ] {
            let review = advisor.review(sql);
            assert_eq!(review.statement, kind, "{}", sql);
            assert!(!review.read_only, "{}", sql);
            assert!(review.warnings.iter().any(|w| w.contains("read-only")));
        }
    }

    #[test]
    fn unparsable_sql_is_a_warning_not_an_error() {
        let review = QueryAdvisor::new().review("SELEC oops FROM");
        assert_eq!(review.statement, StatementKind::Unparsed);
        assert!(review.warnings[0].starts_with("SQL could not be parsed"));
    }

    #[test]
    fn multiple_statements_are_reported() {
        let review = QueryAdvisor::new().review("SELECT 1; DROP TABLE data");
        assert!(!review.read_only);
        assert!(review.warnings.iter().any(|w| w.starts_with("2 statements")));
    }

    #[test]
    fn loan_field_hints() {
        let review = QueryAdvisor::new().review(
            "SELECT CSCORE_B, DTI, DLQ_STATUS FROM data WHERE ZIP = '902' GROUP BY CSCORE_B, DTI, DLQ_STATUS",
        );
        assert!(review.suggestions.iter().any(|s| s.contains("credit score tiers")));
        assert!(review.suggestions.iter().any(|s| s.contains("ORDER BY")));
        assert!(review.warnings.iter().any(|w| w.starts_with("DTI field")));
        assert!(review.enhancements.iter().any(|e| e.starts_with("DLQ_STATUS values")));
        assert!(review.enhancements.iter().any(|e| e.starts_with("ZIP field")));
    }

    #[test]
    fn identifiers_match_whole_words() {
        let review = QueryAdvisor::new().review("SELECT REAL_ESTATE_FLAG FROM data");
        assert!(!review.suggestions.iter().any(|s| s.contains("GROUP BY STATE")));
    }

    #[test]
    fn question_hints() {
        let advisor = QueryAdvisor::new();
        let hints = advisor.suggest_for_question("Top 10 states by credit risk");
        assert_eq!(hints.len(), 3);
        assert!(advisor.suggest_for_question("hello").is_empty());
    }
}
