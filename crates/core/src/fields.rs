use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The fixed set of fields pulled out of a loan document.
/// Declaration order is the serialization order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanField {
    LoanAmount,
    InterestRate,
    LoanTerm,
    LoanType,
    BorrowerName,
    BorrowerAddress,
    BorrowerPhone,
    BorrowerEmail,
    SocialSecurity,
    ApplicationDate,
    LenderName,
    Collateral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldGroup {
    LoanDetails,
    Borrower,
    Additional,
}

impl FieldGroup {
    pub const ALL: [FieldGroup; 3] = [FieldGroup::LoanDetails, FieldGroup::Borrower, FieldGroup::Additional];

    pub fn title(self) -> &'static str {
        match self {
            FieldGroup::LoanDetails => "Loan Details",
            FieldGroup::Borrower => "Borrower Information",
            FieldGroup::Additional => "Additional Details",
        }
    }
}

impl LoanField {
    pub const ALL: [LoanField; 12] = [
        LoanField::LoanAmount,
        LoanField::InterestRate,
        LoanField::LoanTerm,
        LoanField::LoanType,
        LoanField::BorrowerName,
        LoanField::BorrowerAddress,
        LoanField::BorrowerPhone,
        LoanField::BorrowerEmail,
        LoanField::SocialSecurity,
        LoanField::ApplicationDate,
        LoanField::LenderName,
        LoanField::Collateral,
    ];

    pub fn key(self) -> &'static str {
        match self {
            LoanField::LoanAmount => "loan_amount",
            LoanField::InterestRate => "interest_rate",
            LoanField::LoanTerm => "loan_term",
            LoanField::LoanType => "loan_type",
            LoanField::BorrowerName => "borrower_name",
            LoanField::BorrowerAddress => "borrower_address",
            LoanField::BorrowerPhone => "borrower_phone",
            LoanField::BorrowerEmail => "borrower_email",
            LoanField::SocialSecurity => "social_security",
            LoanField::ApplicationDate => "application_date",
            LoanField::LenderName => "lender_name",
            LoanField::Collateral => "collateral",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LoanField::LoanAmount => "Loan Amount",
            LoanField::InterestRate => "Interest Rate",
            LoanField::LoanTerm => "Loan Term",
            LoanField::LoanType => "Loan Type",
            LoanField::BorrowerName => "Borrower",
            LoanField::BorrowerAddress => "Address",
            LoanField::BorrowerPhone => "Phone",
            LoanField::BorrowerEmail => "Email",
            LoanField::SocialSecurity => "SSN",
            LoanField::ApplicationDate => "Application Date",
            LoanField::LenderName => "Lender",
            LoanField::Collateral => "Collateral",
        }
    }

    pub fn group(self) -> FieldGroup {
        match self {
            LoanField::LoanAmount | LoanField::InterestRate | LoanField::LoanTerm | LoanField::LoanType => {
                FieldGroup::LoanDetails
            }
            LoanField::BorrowerName
            | LoanField::BorrowerAddress
            | LoanField::BorrowerPhone
            | LoanField::BorrowerEmail => FieldGroup::Borrower,
            LoanField::SocialSecurity
            | LoanField::ApplicationDate
            | LoanField::LenderName
            | LoanField::Collateral => FieldGroup::Additional,
        }
    }

    /// Free-form fields that may run long (rendered as a block rather than inline).
    pub fn is_long_text(self) -> bool {
        matches!(self, LoanField::BorrowerAddress | LoanField::Collateral)
    }
}

impl fmt::Display for LoanField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for LoanField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace([' ', '-'], "_");
        LoanField::ALL
            .iter()
            .copied()
            .find(|f| f.key() == key)
            .ok_or_else(|| format!("Unknown loan field: '{s}'"))
    }
}

/// Extracted field values, keyed by field. Only fields that were found are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoanDetails {
    fields: BTreeMap<LoanField, String>,
}

impl LoanDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: LoanField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn insert(&mut self, field: LoanField, value: impl Into<String>) -> Option<String> {
        self.fields.insert(field, value.into())
    }

    /// Apply a manual correction. An empty value removes the field.
    pub fn set(&mut self, field: LoanField, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            self.fields.remove(&field);
        } else {
            self.fields.insert(field, value.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LoanField, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn in_group(&self, group: FieldGroup) -> impl Iterator<Item = (LoanField, &str)> {
        self.iter().filter(move |(f, _)| f.group() == group)
    }

    pub fn loan_amount_decimal(&self) -> Option<Decimal> {
        self.get(LoanField::LoanAmount).and_then(parse_decimal)
    }

    pub fn interest_rate_decimal(&self) -> Option<Decimal> {
        self.get(LoanField::InterestRate).and_then(parse_decimal)
    }

    /// Application date in US order (month/day/year).
    pub fn application_date(&self) -> Option<NaiveDate> {
        self.get(LoanField::ApplicationDate).and_then(parse_us_date)
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    let clean: String = s.chars().filter(|c| *c != ',').collect();
    Decimal::from_str(clean.trim_end_matches('.')).ok()
}

fn parse_us_date(s: &str) -> Option<NaiveDate> {
    let mut parts = s.split(['/', '-', '.']);
    let month: u32 = parts.next()?.parse().ok()?;
    let day: u32 = parts.next()?.parse().ok()?;
    let year: i32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let year = if year < 100 { 2000 + year } else { year };
    NaiveDate::from_ymd_opt(year, month, day)
}
