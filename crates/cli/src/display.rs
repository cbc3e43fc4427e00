use loandoc_core::{FieldGroup, LoanDetails, LoanField, ProcessingSettings};
use loandoc_ocr::{ProcessedDocument, TableData};
use std::fmt::Write;

pub const NOTHING_EXTRACTED: &str = "No information could be extracted from the document.";

/// Fields in the order each section lists them.
fn section_fields(group: FieldGroup) -> &'static [LoanField] {
    match group {
        FieldGroup::LoanDetails => &[
            LoanField::LoanAmount,
            LoanField::InterestRate,
            LoanField::LoanTerm,
            LoanField::LoanType,
        ],
        FieldGroup::Borrower => &[
            LoanField::BorrowerName,
            LoanField::BorrowerAddress,
            LoanField::BorrowerPhone,
            LoanField::BorrowerEmail,
        ],
        FieldGroup::Additional => &[
            LoanField::ApplicationDate,
            LoanField::LenderName,
            LoanField::SocialSecurity,
            LoanField::Collateral,
        ],
    }
}

/// Value as shown to the user: amounts get `$`, rates get `%`.
pub fn display_value(field: LoanField, value: &str) -> String {
    match field {
        LoanField::LoanAmount => format!("${value}"),
        LoanField::InterestRate => format!("{value}%"),
        _ => value.to_string(),
    }
}

/// `12.34 KB`
pub fn format_size(bytes: u64) -> String {
    format!("{:.2} KB", bytes as f64 / 1024.0)
}

pub fn file_details(doc: &ProcessedDocument) -> String {
    let mut out = String::from("File Details:\n");
    let _ = writeln!(out, "  Filename:  {}", doc.file_name);
    let _ = writeln!(out, "  File size: {}", format_size(doc.size_bytes));
    let _ = writeln!(out, "  Type:      {}", doc.kind);
    if doc.pages > 0 {
        let _ = writeln!(out, "  Pages:     {}", doc.pages);
    }
    out
}

pub fn extracted_information(details: &LoanDetails) -> String {
    if details.is_empty() {
        return format!("{NOTHING_EXTRACTED}\n");
    }
    let mut out = String::from("Extracted Information\n=====================\n");
    for group in FieldGroup::ALL {
        let present: Vec<(LoanField, &str)> = section_fields(group)
            .iter()
            .filter_map(|&f| details.get(f).map(|v| (f, v)))
            .collect();
        if present.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{}", group.title());
        for (field, value) in present {
            let shown = display_value(field, value);
            if field.is_long_text() {
                let _ = writeln!(out, "  {}:", field.label());
                for line in shown.lines() {
                    let _ = writeln!(out, "    {line}");
                }
            } else {
                let _ = writeln!(out, "  {:<17} {}", format!("{}:", field.label()), shown);
            }
        }
    }
    out
}

pub fn raw_text(text: &str) -> String {
    format!("\nExtracted Raw Text\n==================\n{}\n", text.trim_end())
}

pub fn table(data: &TableData) -> String {
    if data.is_empty() {
        return "\nNo table text found.\n".to_string();
    }
    let mut out = String::from("\nTable\n=====\n");
    for row in &data.rows {
        let _ = writeln!(out, "{}", row.join("\t"));
    }
    out
}

pub fn settings(s: &ProcessingSettings) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Image Preprocessing");
    let _ = writeln!(out, "  threshold_method  {}", s.threshold_method);
    let _ = writeln!(out, "  denoise_strength  {}", s.denoise_strength);
    let _ = writeln!(out, "  resize_width      {}", s.resize_width);
    let _ = writeln!(out, "  pdf_dpi           {}", s.pdf_dpi);
    let _ = writeln!(out, "OCR");
    let _ = writeln!(out, "  ocr_engine_mode   {}", s.ocr_engine_mode);
    let _ = writeln!(out, "  page_seg_mode     {}", s.page_seg_mode);
    let _ = writeln!(out, "  language          {}", s.language);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use loandoc_core::DocumentKind;

    fn details(pairs: &[(LoanField, &str)]) -> LoanDetails {
        let mut d = LoanDetails::new();
        for (f, v) in pairs {
            d.insert(*f, *v);
        }
        d
    }

    #[test]
    fn amount_and_rate_are_decorated() {
        assert_eq!(display_value(LoanField::LoanAmount, "250,000"), "$250,000");
        assert_eq!(display_value(LoanField::InterestRate, "4.5"), "4.5%");
        assert_eq!(display_value(LoanField::LoanTerm, "30 years"), "30 years");
    }

    #[test]
    fn size_in_kilobytes() {
        assert_eq!(format_size(0), "0.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
    }

    #[test]
    fn empty_details_warn() {
        assert_eq!(extracted_information(&LoanDetails::new()), format!("{NOTHING_EXTRACTED}\n"));
    }

    #[test]
    fn sections_only_list_present_fields() {
        let out = extracted_information(&details(&[
            (LoanField::LoanAmount, "250,000"),
            (LoanField::SocialSecurity, "123-45-6789"),
            (LoanField::ApplicationDate, "03/15/2024"),
        ]));
        assert!(out.contains("Loan Details"));
        assert!(out.contains("$250,000"));
        assert!(!out.contains("Borrower Information"));
        // Additional Details lists the date before the SSN.
        let date = out.find("03/15/2024").unwrap();
        let ssn = out.find("123-45-6789").unwrap();
        assert!(date < ssn);
    }

    #[test]
    fn long_text_fields_on_own_lines() {
        let out = extracted_information(&details(&[(LoanField::Collateral, "2019 toyota camry")]));
        assert!(out.contains("  Collateral:\n    2019 toyota camry\n"));
    }

    #[test]
    fn file_details_block() {
        let doc = ProcessedDocument {
            file_name: "loan.pdf".into(),
            kind: DocumentKind::Pdf,
            size_bytes: 2048,
            pages: 2,
            text: String::new(),
            details: LoanDetails::new(),
        };
        let out = file_details(&doc);
        assert!(out.contains("Filename:  loan.pdf"));
        assert!(out.contains("File size: 2.00 KB"));
        assert!(out.contains("Pages:     2"));
    }

    #[test]
    fn table_rows_tab_separated() {
        let data = TableData { rows: vec![vec!["Rate".into(), "4.5%".into()]] };
        assert!(table(&data).ends_with("Rate\t4.5%\n"));
        assert!(table(&TableData::default()).contains("No table text found."));
    }
}
