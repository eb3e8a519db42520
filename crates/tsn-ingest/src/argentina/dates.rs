//! Spanish date handling for the SEPA portal
//!
//! The portal renders activity timestamps in Spanish, e.g.
//! `16 Diciembre, 2024, 14:06 (-03)`, and names the daily ZIP files
//! after the Spanish weekday (`sepa_lunes.zip`).

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

static TITLE_RE: OnceLock<Regex> = OnceLock::new();

#[allow(clippy::expect_used)]
fn title_regex() -> &'static Regex {
    TITLE_RE.get_or_init(|| {
        // '16 Diciembre, 2024, 14:06 (-03)'; the offset may appear as
        // '(-03)' or '(-0300)' depending on the portal revision
        Regex::new(r"^\s*(\d{1,2})\s+([A-Za-zÁÉÍÓÚáéíóúñÑ]+),\s+(\d{4})")
            .expect("static regex is valid")
    })
}

fn month_number(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    let n = match name.as_str() {
        "enero" => 1,
        "febrero" => 2,
        "marzo" => 3,
        "abril" => 4,
        "mayo" => 5,
        "junio" => 6,
        "julio" => 7,
        "agosto" => 8,
        "septiembre" | "setiembre" => 9,
        "octubre" => 10,
        "noviembre" => 11,
        "diciembre" => 12,
        _ => return None,
    };
    Some(n)
}

/// Parse an activity timestamp title into its calendar date
///
/// Only the date part matters downstream; the time and the short
/// `(-03)` offset the portal emits are ignored.
pub fn parse_spanish_datetime(title: &str) -> Option<NaiveDate> {
    let caps = title_regex().captures(title)?;
    let day: u32 = caps.get(1)?.as_str().parse().ok()?;
    let month = month_number(caps.get(2)?.as_str())?;
    let year: i32 = caps.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Lowercase Spanish weekday name, unaccented, as the portal uses in
/// download file names
pub fn weekday_es(date: NaiveDate) -> &'static str {
    match date.weekday().num_days_from_monday() {
        0 => "lunes",
        1 => "martes",
        2 => "miercoles",
        3 => "jueves",
        4 => "viernes",
        5 => "sabado",
        _ => "domingo",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_portal_title() {
        let date = parse_spanish_datetime("16 Diciembre, 2024, 14:06 (-03)").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 12, 16).unwrap());
    }

    #[test]
    fn test_parse_full_offset_variant() {
        let date = parse_spanish_datetime("17 Diciembre, 2024, 10:00 (-0300)").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 12, 17).unwrap());
    }

    #[test]
    fn test_parse_all_months() {
        let months = [
            ("Enero", 1),
            ("Febrero", 2),
            ("Marzo", 3),
            ("Abril", 4),
            ("Mayo", 5),
            ("Junio", 6),
            ("Julio", 7),
            ("Agosto", 8),
            ("Septiembre", 9),
            ("Octubre", 10),
            ("Noviembre", 11),
            ("Diciembre", 12),
        ];
        for (name, number) in months {
            let title = format!("1 {}, 2024, 00:00 (-03)", name);
            let date = parse_spanish_datetime(&title).unwrap();
            assert_eq!(date.month(), number, "month {}", name);
        }
    }

    #[test]
    fn test_unparseable_titles() {
        assert_eq!(parse_spanish_datetime("Hace 2 horas."), None);
        assert_eq!(parse_spanish_datetime("16 Frobuary, 2024, 14:06 (-03)"), None);
        assert_eq!(parse_spanish_datetime(""), None);
    }

    #[test]
    fn test_weekday_names() {
        // 2024-12-16 is a Monday
        let monday = NaiveDate::from_ymd_opt(2024, 12, 16).unwrap();
        assert_eq!(weekday_es(monday), "lunes");
        assert_eq!(weekday_es(monday + chrono::Days::new(5)), "sabado");
        assert_eq!(weekday_es(monday + chrono::Days::new(6)), "domingo");
    }
}
