//! Field extraction for the two text feeds.
//!
//! Both parsers return `None` for text they do not recognise. The feeds carry
//! plenty of noise, so a miss is filtering rather than an error. Casing is
//! preserved for display; keyword comparison happens in the correlator.

use regex::Regex;
use std::sync::LazyLock;

static POSTAL_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-9]{4,5}\b").expect("valid postal code pattern"));

static TIME_OF_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[01]?[0-9]|2[0-3]):[0-5][0-9]\b").expect("valid time pattern")
});

/// Any dispatch field key followed by a colon, wherever it sits in the message.
static DISPATCH_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(dispatch\s+number|einsatznummer|alarm\s*code|stichwort|alarm\s+issue|keyword|plz|postal|fahrzeug|vehicle)\s*:",
    )
    .expect("valid dispatch key pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPreAlert {
    pub keyword: String,
    pub postal_code: String,
    pub time_text: Option<String>,
    /// Text with the feed prefix stripped, as shown on the notice.
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDispatch {
    pub dispatch_number: String,
    pub alarm_code: String,
    pub keyword: String,
    pub postal_code: String,
    pub vehicle: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchField {
    Number,
    AlarmCode,
    Keyword,
    PostalCode,
    Vehicle,
}

impl DispatchField {
    fn from_key(key: &str) -> Option<Self> {
        let key = key.split_whitespace().collect::<Vec<_>>().join(" ");
        match key.to_lowercase().as_str() {
            "dispatch number" | "einsatznummer" => Some(DispatchField::Number),
            "alarmcode" | "alarm code" => Some(DispatchField::AlarmCode),
            "stichwort" | "alarm issue" | "keyword" => Some(DispatchField::Keyword),
            "plz" | "postal" => Some(DispatchField::PostalCode),
            "fahrzeug" | "vehicle" => Some(DispatchField::Vehicle),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextParser {
    prefix: Option<Regex>,
}

impl TextParser {
    /// `feed_prefix` is the banner the pre-alert feed puts in front of every message.
    pub fn new(feed_prefix: &str) -> Self {
        let feed_prefix = feed_prefix.trim();
        let prefix = if feed_prefix.is_empty() {
            None
        } else {
            Regex::new(&format!(r"(?i){}\s*[-–]*\s*", regex::escape(feed_prefix))).ok()
        };
        Self { prefix }
    }

    pub fn parse_pre_alert(&self, text: &str) -> Option<ParsedPreAlert> {
        let description = self.strip_prefix(text);

        let keyword = description
            .split_whitespace()
            .next()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| !w.is_empty())?
            .to_string();
        let postal_code = POSTAL_CODE.find(&description)?.as_str().to_string();
        let time_text = TIME_OF_DAY.find(&description).map(|m| m.as_str().to_string());

        Some(ParsedPreAlert {
            keyword,
            postal_code,
            time_text,
            description,
        })
    }

    pub fn parse_dispatch(&self, text: &str) -> Option<ParsedDispatch> {
        let mut number = None;
        let mut alarm_code = None;
        let mut keyword = None;
        let mut postal_code = None;
        let mut vehicle = None;

        // A field's value runs up to the next key, a `|` or the end of the line.
        let keys: Vec<_> = DISPATCH_KEY.captures_iter(text).collect();
        for (i, caps) in keys.iter().enumerate() {
            let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let Some(field) = DispatchField::from_key(key.as_str()) else {
                continue;
            };
            let end = keys
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(text.len(), |next| next.start());
            let value = text[whole.end()..end]
                .split(['|', '\n'])
                .next()
                .unwrap_or_default()
                .trim_matches(|c: char| c.is_whitespace() || c == '*');

            let slot = match field {
                DispatchField::Number => &mut number,
                DispatchField::AlarmCode => &mut alarm_code,
                DispatchField::Keyword => &mut keyword,
                DispatchField::PostalCode => &mut postal_code,
                DispatchField::Vehicle => &mut vehicle,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }

        let dispatch_number = first_token(number?).filter(|n| all_digits(n))?;
        let alarm_code = first_token(alarm_code?)?;
        let keyword = keyword.filter(|k| !k.is_empty())?;
        let postal_code =
            first_token(postal_code?).filter(|p| (4..=5).contains(&p.len()) && all_digits(p))?;
        let vehicle = vehicle.filter(|v| !v.is_empty());

        Some(ParsedDispatch {
            dispatch_number: dispatch_number.to_string(),
            alarm_code: alarm_code.to_string(),
            keyword: keyword.to_string(),
            postal_code: postal_code.to_string(),
            vehicle: vehicle.map(str::to_string),
        })
    }

    fn strip_prefix(&self, text: &str) -> String {
        let text = match &self.prefix {
            Some(re) => re.replace_all(text, ""),
            None => text.into(),
        };
        text.trim_start_matches(|c: char| c == '*' || c == '-' || c == '–' || c.is_whitespace())
            .trim_end()
            .to_string()
    }
}

fn first_token(value: &str) -> Option<&str> {
    value.split_whitespace().next()
}

fn all_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> TextParser {
        TextParser::new("Ehrenamt Alarmierung: FF Wiener Neustadt")
    }

    #[test]
    fn test_pre_alert_fields() {
        let parsed = parser().parse_pre_alert("Brand PLZ 2700 – 14:32").unwrap();
        assert_eq!(parsed.keyword, "Brand");
        assert_eq!(parsed.postal_code, "2700");
        assert_eq!(parsed.time_text.as_deref(), Some("14:32"));
        assert_eq!(parsed.description, "Brand PLZ 2700 – 14:32");
    }

    #[test]
    fn test_pre_alert_strips_feed_prefix_and_markup() {
        let parsed = parser()
            .parse_pre_alert("** - EHRENAMT ALARMIERUNG: FF Wiener Neustadt -- Sturm, 2700 Wiener Neustadt")
            .unwrap();
        assert_eq!(parsed.keyword, "Sturm");
        assert_eq!(parsed.postal_code, "2700");
        assert_eq!(parsed.time_text, None);
        assert_eq!(parsed.description, "Sturm, 2700 Wiener Neustadt");
    }

    #[test]
    fn test_pre_alert_without_postal_code_is_a_miss() {
        assert_eq!(parser().parse_pre_alert("Brand in Wiener Neustadt"), None);
        assert_eq!(parser().parse_pre_alert("Brand PLZ 270"), None);
        assert_eq!(parser().parse_pre_alert("Brand PLZ 270012"), None);
        assert_eq!(parser().parse_pre_alert("   "), None);
    }

    #[test]
    fn test_dispatch_fields() {
        let parsed = parser()
            .parse_dispatch(
                "Dispatch number: 9608 | Alarmcode: A1 | Stichwort: Brandmeldeanlage | PLZ: 2700 | Fahrzeug: Tank 6",
            )
            .unwrap();
        assert_eq!(
            parsed,
            ParsedDispatch {
                dispatch_number: "9608".to_string(),
                alarm_code: "A1".to_string(),
                keyword: "Brandmeldeanlage".to_string(),
                postal_code: "2700".to_string(),
                vehicle: Some("Tank 6".to_string()),
            }
        );
    }

    #[test]
    fn test_dispatch_without_vehicle() {
        let parsed = parser()
            .parse_dispatch("dispatch number: 77 | alarmcode: T2 extra | stichwort: Sturm | plz: 27001 | Fahrzeug:  ")
            .unwrap();
        assert_eq!(parsed.dispatch_number, "77");
        assert_eq!(parsed.alarm_code, "T2");
        assert_eq!(parsed.postal_code, "27001");
        assert_eq!(parsed.vehicle, None);
    }

    #[test]
    fn test_dispatch_accepts_line_separated_aliases() {
        let parsed = parser()
            .parse_dispatch("Einsatznummer: 12\nAlarm code: B3\nAlarm issue: Wohnhausbrand\nPostal: 2700")
            .unwrap();
        assert_eq!(parsed.dispatch_number, "12");
        assert_eq!(parsed.alarm_code, "B3");
        assert_eq!(parsed.keyword, "Wohnhausbrand");
        assert_eq!(parsed.vehicle, None);
    }

    #[test]
    fn test_dispatch_misses() {
        let p = parser();
        // non-numeric dispatch number
        assert_eq!(
            p.parse_dispatch("Dispatch number: 96A8 | Alarmcode: A1 | Stichwort: Brand | PLZ: 2700"),
            None
        );
        // postal code too short
        assert_eq!(
            p.parse_dispatch("Dispatch number: 9608 | Alarmcode: A1 | Stichwort: Brand | PLZ: 270"),
            None
        );
        // missing keyword
        assert_eq!(p.parse_dispatch("Dispatch number: 9608 | Alarmcode: A1 | PLZ: 2700"), None);
        assert_eq!(p.parse_dispatch("good morning everyone"), None);
    }

    #[test]
    fn test_dispatch_behind_a_banner() {
        let parsed = parser()
            .parse_dispatch(
                "🚨 Einsatz – Dispatch number: 9608 | Alarmcode: A1 | Stichwort: Brandmeldeanlage | PLZ: 2700 | Fahrzeug: Tank 6",
            )
            .unwrap();
        assert_eq!(parsed.dispatch_number, "9608");
        assert_eq!(parsed.keyword, "Brandmeldeanlage");
        assert_eq!(parsed.vehicle.as_deref(), Some("Tank 6"));
    }

    #[test]
    fn test_dispatch_fields_sharing_a_segment() {
        let parsed = parser()
            .parse_dispatch("Dispatch number: 9608 Alarmcode: A1 | Stichwort: Brand | PLZ: 2700")
            .unwrap();
        assert_eq!(parsed.dispatch_number, "9608");
        assert_eq!(parsed.alarm_code, "A1");
        assert_eq!(parsed.keyword, "Brand");
        assert_eq!(parsed.postal_code, "2700");
        assert_eq!(parsed.vehicle, None);
    }

    #[test]
    fn test_dispatch_value_stops_at_separator() {
        let parsed = parser()
            .parse_dispatch("**Dispatch number:** 12 | Stichwort: Sturm | Ort: Hauptplatz | Alarm code: T1 | PLZ: 2700")
            .unwrap();
        assert_eq!(parsed.dispatch_number, "12");
        assert_eq!(parsed.keyword, "Sturm");
        assert_eq!(parsed.alarm_code, "T1");
    }

    #[test]
    fn test_first_occurrence_of_a_field_wins() {
        let parsed = parser()
            .parse_dispatch("Dispatch number: 1 | Alarmcode: A1 | Stichwort: Brand | PLZ: 2700 | Stichwort: Sturm")
            .unwrap();
        assert_eq!(parsed.keyword, "Brand");
    }
}
