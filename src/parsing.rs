//! Tolerant parsers for the free-form values found in marketplace exports.
//!
//! None of these ever fail: unparseable input comes back as `NaN` (or `None`
//! for the locale and count helpers) so one bad cell cannot sink a run.

/// Parses a price such as `"399,00 €"`, `"1.234,56"`, `"1,234.56"` or `"399"`.
///
/// Whichever of the rightmost comma and the rightmost dot comes later is the
/// decimal separator; the other symbol is a thousands separator and dropped.
pub fn parse_price(raw: &str) -> f64 {
    let s = raw.trim();
    if s.is_empty() {
        return f64::NAN;
    }
    let s = s.replace('\u{a0}', " ").replace("EUR", "");
    let s: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    if s.is_empty() {
        return f64::NAN;
    }

    let normalized = match (s.rfind(','), s.rfind('.')) {
        (None, None) => s,
        (Some(comma), dot) if dot.map_or(true, |d| comma > d) => {
            s.replace('.', "").replace(',', ".")
        }
        _ => s.replace(',', ""),
    };

    normalized.parse::<f64>().unwrap_or(f64::NAN)
}

/// Parses `"7,00 %"` into `0.07`. Always divides by 100.
pub fn parse_pct(raw: &str) -> f64 {
    let stripped = raw.trim().replace('%', "");
    parse_price(&stripped) / 100.0
}

/// Percentage coercion used at ingestion: values above 1 are read as a 0-100
/// scale, everything else is taken as an already-fractional value.
pub fn parse_fraction(raw: &str) -> f64 {
    let stripped = raw.trim().replace('%', "");
    scale_fraction(parse_price(&stripped))
}

/// Applies the 0-100 scale heuristic to an already numeric percentage.
pub fn scale_fraction(value: f64) -> f64 {
    if value > 1.0 {
        value / 100.0
    } else {
        value
    }
}

/// Parses integer-valued columns (ranks, counts, grams). Truncates toward zero.
pub fn parse_count(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(f64::trunc)
}

/// Extracts an upper-case 2-letter country code from `"amazon.de"`,
/// `"de-DE"`, `"it"` and similar. `gb` is folded into `UK`.
pub fn normalize_locale(raw: &str) -> Option<String> {
    let t = raw.trim().to_lowercase();
    if t.is_empty() {
        return None;
    }

    let code = domain_code(&t)
        .or_else(|| region_tag_code(&t))
        .or_else(|| bare_code(&t))?;

    let code = match code.as_str() {
        "gb" | "uk" => "UK".to_string(),
        other => other.to_uppercase(),
    };
    Some(code)
}

fn domain_code(t: &str) -> Option<String> {
    let (_, tld) = t.rsplit_once("amazon.")?;
    let tld = tld.split('/').next().unwrap_or_default();
    let tld = tld.split_whitespace().next()?;
    let tld = tld.replace("co.uk", "uk");
    let code: String = tld.chars().take(2).collect();
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_lowercase()) {
        Some(code)
    } else {
        None
    }
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_letter_pair(chars: &[char]) -> bool {
    chars.len() == 2 && chars.iter().all(|c| c.is_ascii_lowercase())
}

/// First `xx-yy` occurrence bounded by non-word characters.
fn region_tag_code(t: &str) -> Option<String> {
    let chars: Vec<char> = t.chars().collect();
    if chars.len() < 5 {
        return None;
    }
    (0..=chars.len() - 5).find_map(|i| {
        let bounded_left = i == 0 || !is_word(chars[i - 1]);
        let bounded_right = i + 5 == chars.len() || !is_word(chars[i + 5]);
        let matches = bounded_left
            && bounded_right
            && is_letter_pair(&chars[i..i + 2])
            && chars[i + 2] == '-'
            && is_letter_pair(&chars[i + 3..i + 5]);
        matches.then(|| chars[i..i + 2].iter().collect())
    })
}

/// First standalone two-letter word.
fn bare_code(t: &str) -> Option<String> {
    t.split(|c: char| !is_word(c))
        .find(|word| is_letter_pair(&word.chars().collect::<Vec<_>>()))
        .map(str::to_string)
}
