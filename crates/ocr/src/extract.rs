use std::sync::OnceLock;

use loandoc_core::{LoanDetails, LoanField};
use regex::{Captures, Regex};

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_whitespace, r"\s+");

/// Pattern for each field, matched against lower-cased text. Group 1 holds the
/// value; phone, SSN and loan term capture their parts separately.
/// Free-text values stop at the end of the line.
fn pattern(field: LoanField) -> &'static str {
    match field {
        LoanField::LoanAmount => r"loan amount[:\s]*\$?([0-9,.]+)",
        LoanField::InterestRate => r"interest rate[:\s]*([0-9.]+)%?",
        LoanField::LoanTerm => r"loan term[:\s]*([0-9]+)\s+(years|months)",
        LoanField::LoanType => r"loan type[: \t]*([a-z][a-z \t]*)",
        LoanField::BorrowerName => r"borrower(?:'s)?\s+name[: \t]*([a-z][a-z \t]*)",
        LoanField::BorrowerAddress => r"(?:address|residence)[: \t]*([a-z0-9][a-z0-9 \t.,#-]*)",
        LoanField::BorrowerPhone => {
            r"(?:phone|telephone)[:\s]*\(?([0-9]{3})\)?[\s.-]?([0-9]{3})[\s.-]?([0-9]{4})"
        }
        LoanField::BorrowerEmail => r"email[:\s]*([a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,})",
        LoanField::SocialSecurity => {
            r"(?:ssn|social security(?:[ \t]+number)?)[:\s]*([0-9]{3})-?([0-9]{2})-?([0-9]{4})"
        }
        LoanField::ApplicationDate => r"(?:application|date)[:\s]*(\d{1,2}[/.-]\d{1,2}[/.-]\d{2,4})",
        LoanField::LenderName => r"lender(?:'s)?(?:[ \t]+name)?[: \t]*([a-z][a-z \t]*)",
        LoanField::Collateral => r"collateral[: \t]*([a-z0-9][a-z0-9 \t.,#-]*)",
    }
}

fn table() -> &'static [(LoanField, Regex)] {
    static TABLE: OnceLock<Vec<(LoanField, Regex)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        LoanField::ALL
            .iter()
            .map(|&f| (f, Regex::new(&format!("(?i){}", pattern(f))).expect("invalid regex")))
            .collect()
    })
}

// ── Public extraction API ─────────────────────────────────────────────────────

pub struct Extractor;

impl Extractor {
    /// Extract every field the text mentions. Fields without a match are absent.
    pub fn extract(ocr_text: &str) -> LoanDetails {
        let text = ocr_text.to_lowercase();
        let mut details = LoanDetails::new();
        for (field, re) in table() {
            if let Some(value) = re.captures(&text).and_then(|c| format_match(*field, &c)) {
                details.insert(*field, value);
            }
        }
        details
    }

    pub fn extract_field(ocr_text: &str, field: LoanField) -> Option<String> {
        let text = ocr_text.to_lowercase();
        let (_, re) = table().iter().find(|(f, _)| *f == field)?;
        format_match(field, &re.captures(&text)?)
    }
}

fn format_match(field: LoanField, c: &Captures<'_>) -> Option<String> {
    let raw = match field {
        LoanField::BorrowerPhone => {
            format!("({}) {}-{}", c.get(1)?.as_str(), c.get(2)?.as_str(), c.get(3)?.as_str())
        }
        LoanField::SocialSecurity => {
            format!("{}-{}-{}", c.get(1)?.as_str(), c.get(2)?.as_str(), c.get(3)?.as_str())
        }
        LoanField::LoanTerm => format!("{} {}", c.get(1)?.as_str(), c.get(2)?.as_str()),
        _ => c.get(1)?.as_str().to_string(),
    };
    clean_value(&raw)
}

/// Collapse whitespace, trim, and drop trailing sentence punctuation.
fn clean_value(value: &str) -> Option<String> {
    let collapsed = re_whitespace().replace_all(value, " ");
    let cleaned = collapsed.trim().trim_end_matches(['.', ',']).trim_end();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
