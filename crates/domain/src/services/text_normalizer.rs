//! Cleanup of OCR-captured location text, distances and device names.

lazy_static::lazy_static! {
    static ref TIME_AGO_SUFFIX: regex::Regex =
        regex::Regex::new(r"(?i)\s*,\s*\d+\s*(?:min(?:ute)?|hr|hour)s?\.?\s*ago\s*$").unwrap();
    static ref STATUS_SUFFIX: regex::Regex =
        regex::Regex::new(r"(?i)\s*,\s*(?:paused|now)\s*$").unwrap();
    static ref NOT_A_LOCATION: regex::Regex = regex::Regex::new(
        r"(?i)^(?:last\s*seen.*|seen\s*\d.*|\d+\s*(?:min(?:ute)?|hr|hour)s?\.?\s*ago|no location found.*)$"
    )
    .unwrap();
    static ref TRAILING_PUNCTUATION: regex::Regex =
        regex::Regex::new(r"\s*[-:.]\d*\s*$").unwrap();
    static ref DISALLOWED_CHARS: regex::Regex = regex::Regex::new(r"[^\w\s,.\-]").unwrap();
    static ref WHITESPACE: regex::Regex = regex::Regex::new(r"\s+").unwrap();
    static ref WORD_START: regex::Regex = regex::Regex::new(r"\b\w").unwrap();
    static ref DISTANCE: regex::Regex = regex::Regex::new(
        r"(?i)(\d+(?:[.,]\d+)?)(?:\s*-\s*(\d+(?:[.,]\d+)?))?\s*(km|m)\b"
    )
    .unwrap();
    static ref DEVICE_NAME_TRAILER: regex::Regex = regex::Regex::new(r"[\s.%°\-]+$").unwrap();
}

/// Clean text stored when a reading carries no usable location.
pub const LOCATION_NOT_AVAILABLE: &str = "Location not available";

const HOME: &str = "Home";
const MAX_PASSES: usize = 8;

/// Normalizes raw location text into its canonical display form.
///
/// Relative time and status suffixes are dropped, texts that describe a
/// time rather than a place collapse to [`LOCATION_NOT_AVAILABLE`], and the
/// rest is stripped of OCR debris and title-cased.
pub fn normalize(raw: Option<&str>) -> String {
    let mut current = normalize_pass(raw.unwrap_or_default());
    for _ in 0..MAX_PASSES {
        let next = normalize_pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Whether a clean text denotes an actual place worth geocoding.
pub fn is_location_available(clean: &str) -> bool {
    clean != LOCATION_NOT_AVAILABLE
}

fn normalize_pass(raw: &str) -> String {
    let text = raw.trim();
    if text.is_empty() || text.eq_ignore_ascii_case(LOCATION_NOT_AVAILABLE) {
        return LOCATION_NOT_AVAILABLE.to_string();
    }

    let text = strip_repeatedly(text, &[&TIME_AGO_SUFFIX, &STATUS_SUFFIX]);
    if NOT_A_LOCATION.is_match(text.trim()) {
        return LOCATION_NOT_AVAILABLE.to_string();
    }

    let text = DISALLOWED_CHARS.replace_all(&text, "");
    let text = WHITESPACE.replace_all(text.trim(), " ");
    let text = strip_repeatedly(&text, &[&TRAILING_PUNCTUATION]);
    let text = text.trim();

    if text.is_empty() {
        LOCATION_NOT_AVAILABLE.to_string()
    } else if text.eq_ignore_ascii_case(HOME) {
        HOME.to_string()
    } else {
        title_case(text)
    }
}

fn strip_repeatedly(text: &str, patterns: &[&regex::Regex]) -> String {
    let mut current = text.to_string();
    loop {
        let before = current.len();
        for pattern in patterns {
            current = pattern.replace(&current, "").into_owned();
        }
        if current.len() == before {
            return current;
        }
    }
}

/// Uppercases the first character of every word. Other letters keep their case.
fn title_case(text: &str) -> String {
    WORD_START
        .replace_all(text, |caps: &regex::Captures| caps[0].to_uppercase())
        .into_owned()
}

/// Parses a captured distance such as `"1,2 km"` or `"350 m"` into meters.
///
/// Ranges (`"9-10km"`) resolve to their midpoint. `"okm"` is the usual OCR
/// reading of `"0km"`.
pub fn parse_distance_meters(raw: Option<&str>) -> Option<i32> {
    let cleaned: String = raw?
        .chars()
        .filter(|c| !matches!(c, '%' | '°'))
        .collect::<String>()
        .trim()
        .to_lowercase();

    let compact: String = cleaned.chars().filter(|c| !c.is_whitespace()).collect();
    if compact == "okm" || compact == "om" {
        return Some(0);
    }

    let captures = DISTANCE.captures(&cleaned)?;
    let parse = |s: &str| s.replace(',', ".").parse::<f64>().ok();

    let low = parse(&captures[1])?;
    let value = match captures.get(2) {
        Some(high) => (low + parse(high.as_str())?) / 2.0,
        None => low,
    };
    let meters = if &captures[3] == "km" {
        value * 1000.0
    } else {
        value
    };

    let meters = meters.round();
    if meters.is_finite() && meters <= f64::from(i32::MAX) {
        Some(meters as i32)
    } else {
        None
    }
}

/// Tidies a raw device name the way the capture parser emits it.
///
/// Trailing OCR artifacts (`.`, `%`, `°`, `-`) are dropped and inner
/// whitespace is collapsed. Case is preserved.
pub fn tidy_device_name(raw: &str) -> String {
    let trimmed = DEVICE_NAME_TRAILER.replace(raw.trim(), "");
    let without_artifacts: String = trimmed.chars().filter(|c| !matches!(c, '%' | '°')).collect();
    WHITESPACE
        .replace_all(without_artifacts.trim(), " ")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::{Fake, Faker};

    #[test]
    fn test_missing_text_is_not_available() {
        assert_eq!(normalize(None), LOCATION_NOT_AVAILABLE);
        assert_eq!(normalize(Some("")), LOCATION_NOT_AVAILABLE);
        assert_eq!(normalize(Some("   ")), LOCATION_NOT_AVAILABLE);
    }

    #[test]
    fn test_home_variants() {
        assert_eq!(normalize(Some("home")), "Home");
        assert_eq!(normalize(Some("Home")), "Home");
        assert_eq!(normalize(Some("HOME ")), "Home");
    }

    #[test]
    fn test_time_suffixes_are_stripped() {
        assert_eq!(normalize(Some("Home , 4 min ago")), "Home");
        assert_eq!(normalize(Some("Home, 12 mins ago")), "Home");
        assert_eq!(normalize(Some("Work, 1 hr ago")), "Work");
        assert_eq!(normalize(Some("Work, 2 hours ago")), "Work");
        assert_eq!(normalize(Some("Home , Now")), "Home");
        assert_eq!(normalize(Some("Station Street, Paused")), "Station Street");
        assert_eq!(normalize(Some("Station Street, paused")), "Station Street");
    }

    #[test]
    fn test_time_only_texts_are_not_locations() {
        assert_eq!(normalize(Some("5 min ago")), LOCATION_NOT_AVAILABLE);
        assert_eq!(normalize(Some("2 hours ago")), LOCATION_NOT_AVAILABLE);
        assert_eq!(normalize(Some("Lastseen1hrago")), LOCATION_NOT_AVAILABLE);
        assert_eq!(normalize(Some("Last seen 3 hr ago")), LOCATION_NOT_AVAILABLE);
        assert_eq!(normalize(Some("Seen 5 min ago")), LOCATION_NOT_AVAILABLE);
        assert_eq!(normalize(Some("No location found")), LOCATION_NOT_AVAILABLE);
    }

    #[test]
    fn test_ocr_debris_is_removed() {
        assert_eq!(normalize(Some("Kortrijksesteenweg -")), "Kortrijksesteenweg");
        assert_eq!(normalize(Some("Gent Sint-Pieters:")), "Gent Sint-Pieters");
        assert_eq!(normalize(Some("Veldstraat.3")), "Veldstraat");
        assert_eq!(normalize(Some("Korenmarkt   •  Gent")), "Korenmarkt Gent");
        assert_eq!(normalize(Some("Home |")), "Home");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(normalize(Some("main street, ghent")), "Main Street, Ghent");
        assert_eq!(normalize(Some("main street,ghent")), "Main Street,Ghent");
        assert_eq!(normalize(Some("merelbeke-melle")), "Merelbeke-Melle");
        assert_eq!(normalize(Some("rue de l'église")), "Rue De Léglise");
        assert_eq!(normalize(Some("sint.pietersplein 5")), "Sint.Pietersplein 5");
    }

    #[test]
    fn test_title_case_keeps_existing_capitals() {
        assert_eq!(normalize(Some("KFC Drive")), "KFC Drive");
        assert_eq!(normalize(Some("E40 KORTRIJK")), "E40 KORTRIJK");
        assert_eq!(normalize(Some("MERELBEKE-MELLE")), "MERELBEKE-MELLE");
        assert_eq!(normalize(Some("McDonald's")), "McDonalds");
    }

    #[test]
    fn test_trailing_comma_is_kept() {
        assert_eq!(normalize(Some("Station Street,")), "Station Street,");
        assert_eq!(normalize(Some("Station Street,:")), "Station Street,");
    }

    #[test]
    fn test_debris_only_is_not_available() {
        assert_eq!(normalize(Some("•••")), LOCATION_NOT_AVAILABLE);
        assert_eq!(normalize(Some("-")), LOCATION_NOT_AVAILABLE);
    }

    #[test]
    fn test_sentinel_is_stable() {
        assert_eq!(normalize(Some(LOCATION_NOT_AVAILABLE)), LOCATION_NOT_AVAILABLE);
        assert!(!is_location_available(&normalize(Some("5 min ago"))));
        assert!(is_location_available(&normalize(Some("Work"))));
    }

    #[test]
    fn test_normalize_is_idempotent_on_samples() {
        let samples = [
            "Home , 4 min ago",
            "Home , Now",
            "Lastseen1hrago",
            "Veldstraat 12.",
            "a - b - c -",
            "x.1.2.3",
            "  Sint-Amandsberg ,  Paused ",
            "ß straße",
            "...,,,---",
        ];
        for sample in samples {
            let once = normalize(Some(sample));
            assert_eq!(normalize(Some(&once)), once, "sample {sample:?}");
        }
    }

    #[test]
    fn test_normalize_is_idempotent_on_random_text() {
        for _ in 0..500 {
            let sample: String = Faker.fake();
            let once = normalize(Some(&sample));
            assert_eq!(normalize(Some(&once)), once, "sample {sample:?}");
        }
    }

    #[test]
    fn test_parse_distance() {
        assert_eq!(parse_distance_meters(Some("0 km")), Some(0));
        assert_eq!(parse_distance_meters(Some("okm")), Some(0));
        assert_eq!(parse_distance_meters(Some("OKM")), Some(0));
        assert_eq!(parse_distance_meters(Some("1,2 km")), Some(1200));
        assert_eq!(parse_distance_meters(Some("1.25km")), Some(1250));
        assert_eq!(parse_distance_meters(Some("9-10km")), Some(9500));
        assert_eq!(parse_distance_meters(Some("350 m")), Some(350));
        assert_eq!(parse_distance_meters(Some("12°km")), Some(12000));
    }

    #[test]
    fn test_parse_distance_unparseable() {
        assert_eq!(parse_distance_meters(None), None);
        assert_eq!(parse_distance_meters(Some("")), None);
        assert_eq!(parse_distance_meters(Some("far away")), None);
        assert_eq!(parse_distance_meters(Some("3 mi")), None);
    }

    #[test]
    fn test_tidy_device_name() {
        assert_eq!(tidy_device_name("BlackValize"), "BlackValize");
        assert_eq!(tidy_device_name("  Black   Valize.. "), "Black Valize");
        assert_eq!(tidy_device_name("Keys°%"), "Keys");
        assert_eq!(tidy_device_name("Auto -"), "Auto");
        assert_eq!(tidy_device_name("..."), "");
    }
}
