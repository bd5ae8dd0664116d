// 📄 Sanction Letter - approved-loan PDF generation
// Single-page US Letter layout with built-in Helvetica faces. Letters are
// write-once: every filename carries a timestamp plus a random nonce.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use printpdf::{BuiltinFont, Color, Line, Mm, PdfDocument, Point, Rgb};
use uuid::Uuid;

use crate::db::Customer;
use crate::underwriting::{format_inr, format_inr_f};

pub const DEFAULT_LETTERS_DIR: &str = "generated_letters";

const LENDER_NAME: &str = "CRESTLINE CAPITAL";
const LENDER_TAGLINE: &str = "Financial Services Limited";
const FOOTER_NOTE: &str = "This is a system-generated letter. No signature is required.";
const FOOTER_CONTACT: &str = "For queries, contact: support@crestlinecapital.com | 1800-123-4567";

// US Letter in millimetres, origin at the bottom-left corner.
// printpdf's Mm wraps an f32, so the constants stay f32 too.
const PAGE_WIDTH_MM: f32 = 215.9;
const PAGE_HEIGHT_MM: f32 = 279.4;
const MARGIN_MM: f32 = 25.4;
const INDENT_MM: f32 = 30.48;

// ============================================================================
// SANCTION LETTER
// ============================================================================

/// Everything the letter renders. Built from an approved decision plus the
/// customer's KYC fields; rejections never produce one.
#[derive(Debug, Clone)]
pub struct SanctionLetter {
    pub customer_id: i64,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: String,
    pub amount: i64,
    pub interest_rate: f64,
    pub tenure_months: u32,
    /// Printed on the letter; its first 8 hex digits also salt the filename.
    pub reference: Uuid,
    pub issued_at: DateTime<Local>,
}

impl SanctionLetter {
    pub fn for_customer(
        customer: &Customer,
        amount: i64,
        interest_rate: f64,
        tenure_months: u32,
    ) -> Self {
        SanctionLetter {
            customer_id: customer.id,
            customer_name: customer.name.clone(),
            customer_phone: customer.phone.clone(),
            customer_address: customer.address.clone(),
            amount,
            interest_rate,
            tenure_months,
            reference: Uuid::new_v4(),
            issued_at: Local::now(),
        }
    }

    /// Flat estimate printed on the letter, not a contractual schedule.
    pub fn estimated_emi(&self) -> f64 {
        let total_payable = self.amount as f64 * (1.0 + self.interest_rate / 100.0);
        total_payable / self.tenure_months as f64
    }

    /// `Sanction_Letter_{customer_id}_{timestamp}_{nonce}.pdf`. The nonce
    /// keeps two letters for the same customer in the same second distinct.
    fn filename(&self) -> String {
        let stamp = self.issued_at.format("%Y%m%d_%H%M%S");
        let nonce = self.reference.simple().to_string();
        format!(
            "Sanction_Letter_{}_{}_{}.pdf",
            self.customer_id,
            stamp,
            &nonce[..8]
        )
    }

    /// Render the letter into `letters_dir`, creating the directory if
    /// needed. Returns the generated filename.
    pub fn write_pdf(&self, letters_dir: &Path) -> Result<String> {
        fs::create_dir_all(letters_dir)
            .with_context(|| format!("create letters directory {}", letters_dir.display()))?;

        let filename = self.filename();
        let path = letters_dir.join(&filename);
        self.render(&path)
            .with_context(|| format!("write sanction letter {}", path.display()))?;

        Ok(filename)
    }

    fn render(&self, path: &Path) -> Result<()> {
        let (doc, page_idx, layer_idx) = PdfDocument::new(
            "Loan Sanction Letter",
            Mm(PAGE_WIDTH_MM),
            Mm(PAGE_HEIGHT_MM),
            "Layer 1",
        );
        let regular = doc.add_builtin_font(BuiltinFont::Helvetica)?;
        let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;
        let oblique = doc.add_builtin_font(BuiltinFont::HelveticaOblique)?;
        let layer = doc.get_page(page_idx).get_layer(layer_idx);

        // Letterhead
        layer.use_text(LENDER_NAME, 20.0, Mm(MARGIN_MM), Mm(254.0), &bold);
        layer.use_text(LENDER_TAGLINE, 10.0, Mm(MARGIN_MM), Mm(246.38), &regular);
        layer.set_outline_thickness(1.0);
        layer.add_line(Line {
            points: vec![
                (Point::new(Mm(MARGIN_MM), Mm(241.3)), false),
                (Point::new(Mm(PAGE_WIDTH_MM - MARGIN_MM), Mm(241.3)), false),
            ],
            is_closed: false,
        });

        layer.use_text("LOAN SANCTION LETTER", 16.0, Mm(MARGIN_MM), Mm(228.6), &bold);
        layer.use_text(
            format!("Date: {}", self.issued_at.format("%d %B, %Y")),
            11.0,
            Mm(MARGIN_MM),
            Mm(215.9),
            &regular,
        );
        layer.use_text(
            format!("Reference: {}", self.reference),
            11.0,
            Mm(MARGIN_MM),
            Mm(209.55),
            &regular,
        );

        // Customer block
        layer.use_text("Customer Details:", 12.0, Mm(MARGIN_MM), Mm(203.2), &bold);
        layer.use_text(
            format!("Name: {}", self.customer_name),
            11.0,
            Mm(INDENT_MM),
            Mm(195.58),
            &regular,
        );
        layer.use_text(
            format!("Phone: {}", self.customer_phone),
            11.0,
            Mm(INDENT_MM),
            Mm(189.23),
            &regular,
        );
        layer.use_text(
            format!("Address: {}", self.customer_address),
            11.0,
            Mm(INDENT_MM),
            Mm(182.88),
            &regular,
        );

        // Loan block
        layer.use_text("Loan Details:", 12.0, Mm(MARGIN_MM), Mm(170.18), &bold);
        layer.use_text(
            format!("Loan Amount: Rs {}", format_inr(self.amount)),
            11.0,
            Mm(INDENT_MM),
            Mm(162.56),
            &regular,
        );
        layer.use_text(
            format!("Interest Rate: {:.1}% per annum", self.interest_rate),
            11.0,
            Mm(INDENT_MM),
            Mm(156.21),
            &regular,
        );
        layer.use_text(
            format!("Tenure: {} months", self.tenure_months),
            11.0,
            Mm(INDENT_MM),
            Mm(149.86),
            &regular,
        );
        layer.use_text(
            format!("Estimated EMI: Rs {}", format_inr_f(self.estimated_emi())),
            11.0,
            Mm(INDENT_MM),
            Mm(143.51),
            &regular,
        );

        // Status, green for the approval the letter certifies
        layer.set_fill_color(Color::Rgb(Rgb::new(0.0, 0.5, 0.0, None)));
        layer.use_text("STATUS: APPROVED", 14.0, Mm(MARGIN_MM), Mm(130.81), &bold);

        // Footer
        layer.set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
        layer.use_text(FOOTER_NOTE, 9.0, Mm(MARGIN_MM), Mm(25.4), &oblique);
        layer.use_text(FOOTER_CONTACT, 9.0, Mm(MARGIN_MM), Mm(19.05), &oblique);

        let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        doc.save(&mut BufWriter::new(file))
            .context("serialize PDF document")?;
        Ok(())
    }
}

/// Letter filenames are flat: no separators, no parent traversal. Download
/// handlers must refuse anything this rejects before touching the disk.
pub fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && !name.contains("..")
        && name.ends_with(".pdf")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}
