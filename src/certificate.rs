use regex::Regex;
use std::sync::OnceLock;

pub const TEMPLATE_EN_53: &str = "Template_EN_53.xlsx";
pub const TEMPLATE_EN_73: &str = "Template_EN_73.xlsx";

/// Form data rendered into a certificate. Immutable once parsed from the
/// request; every conversion strategy sees the same values.
#[derive(Debug, Clone)]
pub struct CertificateFields {
    pub mode: String,
    pub serial_no: String,
    pub tested_date: String,
    pub year: String,
}

impl CertificateFields {
    /// Worksheet cells the template reserves for form data.
    pub fn cell_values(&self) -> [(&'static str, &str); 4] {
        [
            ("F10", self.mode.as_str()),
            ("F12", self.serial_no.as_str()),
            ("F13", self.year.as_str()),
            ("F16", self.tested_date.as_str()),
        ]
    }
}

/// Mode "EN 53" gets its dedicated template; every other mode falls through
/// to the EN 73 layout.
pub fn template_name(mode: &str) -> &'static str {
    if mode == "EN 53" {
        TEMPLATE_EN_53
    } else {
        TEMPLATE_EN_73
    }
}

static UNSAFE_CHARS: OnceLock<Regex> = OnceLock::new();

/// Serial numbers end up in filesystem paths, so anything outside
/// [A-Za-z0-9_-] is replaced before use.
pub fn sanitize_serial_no(serial_no: &str) -> String {
    let re = UNSAFE_CHARS.get_or_init(|| Regex::new(r"[^a-zA-Z0-9\-_]").unwrap());
    re.replace_all(serial_no, "_").into_owned()
}

pub fn excel_filename(sanitized: &str) -> String {
    format!("{}_Certificate.xlsx", sanitized)
}

pub fn pdf_filename(sanitized: &str) -> String {
    format!("{}_Certificate.pdf", sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_path_traversal() {
        let out = sanitize_serial_no("AB/12..\\x");
        assert!(out.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(out, "AB_12___x");
    }

    #[test]
    fn sanitize_keeps_safe_chars() {
        assert_eq!(sanitize_serial_no("SN-2024_001"), "SN-2024_001");
    }

    #[test]
    fn mode_en_53_selects_first_template() {
        assert_eq!(template_name("EN 53"), TEMPLATE_EN_53);
    }

    #[test]
    fn other_modes_select_second_template() {
        assert_eq!(template_name("EN 73"), TEMPLATE_EN_73);
        assert_eq!(template_name("anything else"), TEMPLATE_EN_73);
        assert_eq!(template_name(""), TEMPLATE_EN_73);
    }

    #[test]
    fn artifact_names_use_sanitized_serial() {
        assert_eq!(excel_filename("SN-1"), "SN-1_Certificate.xlsx");
        assert_eq!(pdf_filename("SN-1"), "SN-1_Certificate.pdf");
    }
}
