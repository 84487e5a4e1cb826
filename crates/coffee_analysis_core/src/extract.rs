//! crates/coffee_analysis_core/src/extract.rs
//!
//! The heuristic extraction engine: turns the model's free-form analysis
//! text into a structured [`CoffeeAnalysis`]. This is a best-effort parser
//! over natural language with no guaranteed grammar; it never fails. Every
//! field has a default, and every cascade is represented as data (an
//! ordered rule table) rather than control flow so individual entries can
//! be tested.

use crate::domain::{CoffeeAnalysis, FlavorProfile, Origin, RoastLevel};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// The canonical phrase the model emits when the package is not a NODE
/// product. Its presence short-circuits extraction entirely.
pub const REJECTION_PHRASE: &str =
    "Please take a picture of a product sold by NODE COFFEE ROASTERS";

//=========================================================================================
// Consolidated defaults
//=========================================================================================

/// Every fallback value the engine can substitute, in one auditable place.
/// Merged into the record after all extraction passes have run.
struct Defaults {
    roast_level: RoastLevel,
    overall_rating: f32,
}

const DEFAULTS: Defaults = Defaults {
    roast_level: RoastLevel { value: 3 },
    overall_rating: 4.5,
};

//=========================================================================================
// Rule tables
//=========================================================================================

/// One entry in the roast-level cascade. When the pattern matches, a
/// captured digit 1-5 wins; otherwise the rule's implied value (used by
/// the ordinal-word phrasings) is taken. A match with neither keeps
/// scanning lower-priority rules.
struct RoastRule {
    pattern: Regex,
    implied: Option<u8>,
}

impl RoastRule {
    fn new(pattern: &str, implied: Option<u8>) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("invalid roast rule pattern"),
            implied,
        }
    }
}

/// Ordered most-specific-first: explicit "circle N is filled/darker"
/// phrasings, then ordinal-word phrasings, then generic "X/5" forms.
static ROAST_RULES: Lazy<Vec<RoastRule>> = Lazy::new(|| {
    vec![
        // Verification-format phrasings
        RoastRule::new(r"(?i)after\s*careful\s*examination[,\s]*circle\s*number\s*(\d)", None),
        RoastRule::new(r"(?i)circle\s*number\s*(\d)\s*from\s*the\s*left\s*appears\s*darker", None),
        RoastRule::new(r"(?i)circle\s*number\s*(\d)\s*from\s*the\s*left\s*appears\s*filled", None),
        // Step-by-step phrasings
        RoastRule::new(r"(?i)circle\s*number\s*(\d)\s*is\s*darker", None),
        RoastRule::new(r"(?i)circle\s*number\s*(\d)\s*is\s*filled", None),
        RoastRule::new(r"(?i)circle\s*(\d)\s*is\s*darker/filled", None),
        RoastRule::new(r"(?i)circle\s*(\d)\s*is\s*filled/dark", None),
        RoastRule::new(r"(?i)circle\s*(\d)\s*appears\s*darker", None),
        RoastRule::new(r"(?i)circle\s*(\d)\s*is\s*the\s*filled", None),
        // Position-based phrasings
        RoastRule::new(
            r"(?i)(?:position\s*)?(\d)(?:\s*circle)?\s*from\s*(?:the\s*)?left\s*is\s*filled",
            None,
        ),
        RoastRule::new(
            r"(?i)(?:the\s*)?(\d)(?:st|nd|rd|th)?\s*circle\s*from\s*(?:the\s*)?left\s*is\s*filled",
            None,
        ),
        RoastRule::new(r"(?i)(?:the\s*)?(\d)(?:st|nd|rd|th)?\s*circle.*(?:filled|darker)", None),
        RoastRule::new(r"(?i)(?:the\s*)?(\d)(?:st|nd|rd|th)?\s*position.*filled", None),
        RoastRule::new(r"(?i)position\s*(\d)\s*filled", None),
        // Ordinal words combined with the X/5 rendering
        RoastRule::new(r"(?i)(?:the\s*)?first.*filled.*1[/\s]*5", Some(1)),
        RoastRule::new(r"(?i)(?:the\s*)?second.*filled.*2[/\s]*5", Some(2)),
        RoastRule::new(r"(?i)(?:the\s*)?third.*filled.*3[/\s]*5", Some(3)),
        RoastRule::new(r"(?i)(?:the\s*)?fourth.*filled.*4[/\s]*5", Some(4)),
        RoastRule::new(r"(?i)(?:the\s*)?fifth.*filled.*5[/\s]*5", Some(5)),
        // Direct number phrasings
        RoastRule::new(r"(?i)roast profile[:\s]*(\d)[/\s]*5", None),
        RoastRule::new(r"(?i)roast[:\s]*(\d)[/\s]*5", None),
        RoastRule::new(r"(?i)(\d)[/\s]*5.*roast", None),
        RoastRule::new(r"(?i)roast level[:\s]*(\d)[/\s]*5", None),
        RoastRule::new(r"(?i)(\d) out of 5", None),
        RoastRule::new(r"(?i)(\d)/5", None),
        // Bare ordinal descriptions
        RoastRule::new(r"(?i)first circle (?:filled|darker)", Some(1)),
        RoastRule::new(r"(?i)second circle (?:filled|darker)", Some(2)),
        RoastRule::new(r"(?i)third circle (?:filled|darker)", Some(3)),
        RoastRule::new(r"(?i)fourth circle (?:filled|darker)", Some(4)),
        RoastRule::new(r"(?i)fifth circle (?:filled|darker)", Some(5)),
    ]
});

fn patterns(sources: &[&str]) -> Vec<Regex> {
    sources
        .iter()
        .map(|s| Regex::new(s).expect("invalid extraction pattern"))
        .collect()
}

/// Explicit labels first, then the gazetteer of known origin countries.
static ORIGIN_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    patterns(&[
        r"(?i)origin[:\s]*([^.\n,]+)",
        r"(?i)from[:\s]*([^.\n,]+)",
        r"(?i)(?:guatemala|ethiopia|colombia|brazil|kenya|costa rica|jamaica|yemen|honduras|nicaragua|panama|rwanda|salvador|peru|mexico|ecuador|india|indonesia|papua new guinea)",
    ])
});

/// Explicit labels first, then the gazetteer of known growing regions.
static REGION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    patterns(&[
        r"(?i)region[:\s]*([^.\n,]+)",
        r"(?i)farm[:\s]*([^.\n,]+)",
        r"(?i)(?:huehuetenango|yirgacheffe|sidamo|kona|blue mountain|antigua|tarrazú|jinotega|matagalpa)",
    ])
});

/// All of these are collected, not first-match: notes may be spread over
/// several labeled fragments.
static TASTING_NOTE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    patterns(&[
        r"(?i)tasting notes?[:\s]*([^.\n]+)",
        r"(?i)notes?[:\s]*([^.\n]+)",
        r"(?i)flavou?r profile[:\s]*([^.\n]+)",
        r"(?i)taste[:\s]*([^.\n]+)",
    ])
});

/// Fixed vocabulary of flavor descriptors matched anywhere in the text.
static FLAVOR_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:citrus|chocolate|caramel|fruity|nutty|floral|spicy|sweet|berry|wine|tropical|vanilla|honey|apple|cherry|lemon|orange|cocoa|almond|hazelnut|cinnamon|cardamom)",
    )
    .expect("invalid flavor vocabulary pattern")
});

static PROCESSING_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    patterns(&[
        r"(?i)process(?:ing|ed)?[:\s]*([^.\n,]+)",
        r"(?i)(?:washed|natural|honey|semi-washed|wet-processed|dry-processed|pulped natural)",
    ])
});

static BREW_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    patterns(&[
        r"(?i)brew(?:ing)?[:\s]*([^.\n,]+)",
        r"(?i)recommend(?:ed|s)?\s+for[:\s]*([^.\n,]+)",
        r"(?i)(?:pour over|french press|espresso|drip|aeropress|chemex|v60|moka pot)",
    ])
});

/// Acidity buckets, first matching bucket in listed priority wins.
const ACIDITY_BUCKETS: &[(&[&str], &str)] = &[
    (&["bright", "crisp", "vibrant"], "Bright"),
    (&["smooth", "mellow", "low acid"], "Smooth"),
    (&["balanced"], "Balanced"),
];

/// Body buckets, first matching bucket in listed priority wins.
const BODY_BUCKETS: &[(&[&str], &str)] = &[
    (&["full body", "rich", "heavy"], "Full"),
    (&["light body", "delicate"], "Light"),
    (&["medium body"], "Medium"),
];

/// Each of these present anywhere in the lower-cased text adds 0.1 to the
/// rating (presence, not count; repeats do not double-count).
const POSITIVE_WORDS: &[&str] = &[
    "exceptional",
    "outstanding",
    "premium",
    "exquisite",
    "remarkable",
    "distinctive",
    "complex",
    "balanced",
    "expertly",
    "artisanal",
];

//=========================================================================================
// The engine
//=========================================================================================

/// Parses the model's final answer text into a structured record.
///
/// Pure and idempotent: no I/O, no state across calls, identical input
/// yields an identical record.
pub fn extract(text: &str) -> CoffeeAnalysis {
    if text.contains(REJECTION_PHRASE) {
        return reupload_sentinel();
    }

    let lowered = text.to_lowercase();

    let roast_level = extract_roast_level(text);
    let origin = extract_origin(text);
    let notes = extract_tasting_notes(text);
    let acidity = bucket_match(&lowered, ACIDITY_BUCKETS);
    let body = bucket_match(&lowered, BODY_BUCKETS);
    let processing_method = first_capture(text, &PROCESSING_PATTERNS);
    let brewing = first_capture(text, &BREW_PATTERNS);

    let flavor_profile = if notes.is_empty() && acidity.is_none() && body.is_none() {
        None
    } else {
        Some(FlavorProfile {
            notes,
            acidity: acidity.map(str::to_string),
            body: body.map(str::to_string),
        })
    };

    finalize(RawExtraction {
        roast_level,
        origin,
        flavor_profile,
        processing_method,
        brewing,
        overall_rating: rate(&lowered),
    })
}

/// The sentinel record returned when the model asked for a re-upload.
/// Extraction is skipped regardless of any other content present.
fn reupload_sentinel() -> CoffeeAnalysis {
    CoffeeAnalysis {
        roast_level: DEFAULTS.roast_level,
        origin: Some(Origin {
            country: Some("NODE Coffee Required".to_string()),
            region: Some("Upload NODE Product".to_string()),
        }),
        flavor_profile: Some(FlavorProfile {
            notes: vec!["Upload NODE Coffee Product".to_string()],
            acidity: None,
            body: None,
        }),
        processing_method: None,
        brewing_methods: Vec::new(),
        overall_rating: DEFAULTS.overall_rating,
        needs_reupload: true,
    }
}

/// Intermediate result of the independent extraction passes, before the
/// documented defaults are merged in.
struct RawExtraction {
    roast_level: Option<RoastLevel>,
    origin: Option<Origin>,
    flavor_profile: Option<FlavorProfile>,
    processing_method: Option<String>,
    brewing: Option<String>,
    overall_rating: f32,
}

fn finalize(raw: RawExtraction) -> CoffeeAnalysis {
    CoffeeAnalysis {
        roast_level: raw.roast_level.unwrap_or(DEFAULTS.roast_level),
        origin: raw.origin,
        flavor_profile: raw.flavor_profile,
        processing_method: raw.processing_method,
        brewing_methods: raw.brewing.map(|m| vec![m]).unwrap_or_default(),
        overall_rating: raw.overall_rating,
        needs_reupload: false,
    }
}

//=========================================================================================
// Individual passes
//=========================================================================================

fn extract_roast_level(text: &str) -> Option<RoastLevel> {
    for (index, rule) in ROAST_RULES.iter().enumerate() {
        let Some(caps) = rule.pattern.captures(text) else {
            continue;
        };
        if let Some(digit) = caps.get(1).and_then(|m| m.as_str().parse::<u8>().ok()) {
            if (1..=5).contains(&digit) {
                debug!(rule = index, value = digit, "roast level via captured digit");
                return Some(RoastLevel::new(digit));
            }
        }
        if let Some(implied) = rule.implied {
            debug!(rule = index, value = implied, "roast level via ordinal rule");
            return Some(RoastLevel::new(implied));
        }
        // Matched, but no usable value; keep scanning lower-priority rules.
    }
    None
}

/// Strips markdown emphasis characters from a captured span.
fn clean_span(span: &str) -> String {
    span.replace('*', "").trim().to_string()
}

/// Runs an ordered pattern list, returning the cleaned first capture
/// (or the whole match for capture-less gazetteer entries).
fn first_capture(text: &str, rules: &[Regex]) -> Option<String> {
    for pattern in rules {
        if let Some(caps) = pattern.captures(text) {
            let span = caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str())?;
            return Some(clean_span(span));
        }
    }
    None
}

fn extract_origin(text: &str) -> Option<Origin> {
    let mut origin = Origin::default();
    origin.country = first_capture(text, &ORIGIN_PATTERNS);
    // The region pass merges into the same record; it never overwrites an
    // already-set country.
    origin.region = first_capture(text, &REGION_PATTERNS);
    if origin.is_empty() {
        None
    } else {
        Some(origin)
    }
}

fn extract_tasting_notes(text: &str) -> Vec<String> {
    static LEADING_CONJUNCTION: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)^(?:and|&)\s*").expect("invalid conjunction pattern"));

    let mut notes: Vec<String> = Vec::new();
    let mut push = |note: String| {
        if !notes.contains(&note) {
            notes.push(note);
        }
    };

    // Source 1: labeled captures, split on comma/semicolon.
    for pattern in TASTING_NOTE_PATTERNS.iter() {
        let Some(caps) = pattern.captures(text) else {
            continue;
        };
        let Some(list) = caps.get(1) else { continue };
        for fragment in list.as_str().split([',', ';']) {
            let fragment = LEADING_CONJUNCTION.replace(fragment.trim(), "");
            let cleaned = clean_span(&fragment);
            if cleaned.chars().count() > 2 {
                push(cleaned);
            }
        }
    }

    // Source 2: any occurrence of the fixed flavor vocabulary.
    for found in FLAVOR_WORDS.find_iter(text) {
        push(found.as_str().to_string());
    }

    notes
}

fn bucket_match<'a>(lowered: &str, buckets: &[(&[&str], &'a str)]) -> Option<&'a str> {
    for (keywords, label) in buckets {
        if keywords.iter().any(|kw| lowered.contains(kw)) {
            return Some(label);
        }
    }
    None
}

fn rate(lowered: &str) -> f32 {
    let hits = POSITIVE_WORDS
        .iter()
        .filter(|word| lowered.contains(**word))
        .count();
    (DEFAULTS.overall_rating + 0.1 * hits as f32).min(5.0)
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_rating(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-4,
            "rating {actual} != {expected}"
        );
    }

    #[test]
    fn verification_phrasing_with_origin_and_notes() {
        let record = extract(
            "Circle number 4 from the left appears filled. Origin: Guatemala. Notes: chocolate, caramel.",
        );
        assert_eq!(record.roast_level.to_string(), "Medium-Dark (4/5)");
        let origin = record.origin.expect("origin extracted");
        assert_eq!(origin.country.as_deref(), Some("Guatemala"));
        let notes = record.flavor_profile.expect("flavor profile").notes;
        assert!(notes.iter().any(|n| n == "chocolate"));
        assert!(notes.iter().any(|n| n == "caramel"));
        assert!(!record.needs_reupload);
    }

    #[test]
    fn defaults_when_nothing_matches() {
        let record = extract("An ordinary description with nothing quantified.");
        assert_eq!(record.roast_level.to_string(), "Medium (3/5)");
        assert_rating(record.overall_rating, 4.5);
        assert!(record.origin.is_none());
        assert!(record.processing_method.is_none());
        assert!(record.brewing_methods.is_empty());
    }

    #[test]
    fn rejection_phrase_short_circuits_everything() {
        let record = extract(
            "Circle number 5 is filled. Please take a picture of a product sold by NODE COFFEE ROASTERS. Origin: Kenya.",
        );
        assert!(record.needs_reupload);
        let origin = record.origin.expect("sentinel origin");
        assert_eq!(origin.country.as_deref(), Some("NODE Coffee Required"));
        assert_eq!(origin.region.as_deref(), Some("Upload NODE Product"));
        assert_eq!(record.roast_level.value, 3);
        assert_rating(record.overall_rating, 4.5);
    }

    #[test]
    fn out_of_five_phrasing_maps_to_label() {
        // Generic "X out of 5" phrasing, no circle talk at all.
        let record = extract("I'd call this a 2 out of 5 roast.");
        assert_eq!(record.roast_level.to_string(), "Medium-Light (2/5)");
    }

    #[test]
    fn ordinal_rule_supplies_implied_value() {
        let record = extract("The fourth circle appears filled, so 4/ 5 overall.");
        assert_eq!(record.roast_level.value, 4);
    }

    #[test]
    fn bare_ordinal_circle_description() {
        let record = extract("Looking closely, fifth circle filled on the indicator.");
        assert_eq!(record.roast_level.to_string(), "Dark (5/5)");
    }

    #[test]
    fn digit_out_of_range_falls_through_to_later_rules() {
        // "9/5" matches the generic digit rules but is rejected; the text
        // still carries a valid ordinal description further down the table.
        let record = extract("Rated 9/5 by someone. In truth the second circle filled, 2/5.");
        assert_eq!(record.roast_level.value, 2);
    }

    #[test]
    fn roast_profile_label_has_priority_over_bare_fraction() {
        let record = extract("Roast profile: 1/5. Footnote mentions 4/5 elsewhere.");
        assert_eq!(record.roast_level.to_string(), "Light (1/5)");
    }

    #[test]
    fn origin_gazetteer_hits_without_label() {
        let record = extract("This lot was grown in Ethiopia at altitude.");
        let origin = record.origin.expect("gazetteer origin");
        assert_eq!(origin.country.as_deref(), Some("Ethiopia"));
    }

    #[test]
    fn origin_label_strips_markdown_emphasis() {
        let record = extract("Origin: **Colombia**");
        let origin = record.origin.expect("origin");
        assert_eq!(origin.country.as_deref(), Some("Colombia"));
    }

    #[test]
    fn region_merges_without_overwriting_country() {
        let record = extract("Origin: Guatemala. Region: Huehuetenango.");
        let origin = record.origin.expect("origin");
        assert_eq!(origin.country.as_deref(), Some("Guatemala"));
        assert_eq!(origin.region.as_deref(), Some("Huehuetenango"));
    }

    #[test]
    fn region_gazetteer_alone_still_yields_origin() {
        let record = extract("Classic Yirgacheffe florals in the cup.");
        let origin = record.origin.expect("origin from region gazetteer");
        assert!(origin.country.is_none());
        assert_eq!(origin.region.as_deref(), Some("Yirgacheffe"));
    }

    #[test]
    fn tasting_notes_split_trim_and_drop_short_fragments() {
        let record = extract("Tasting notes: *lemon zest*; and honeycomb, ok");
        let notes = record.flavor_profile.expect("profile").notes;
        assert!(notes.iter().any(|n| n == "lemon zest"));
        assert!(notes.iter().any(|n| n == "honeycomb"));
        // "ok" is two characters and is discarded.
        assert!(!notes.iter().any(|n| n == "ok"));
    }

    #[test]
    fn vocabulary_notes_found_outside_labeled_sections() {
        let record = extract("A cup bursting with caramel sweetness and citrus.");
        let notes = record.flavor_profile.expect("profile").notes;
        assert!(notes.iter().any(|n| n == "caramel"));
        assert!(notes.iter().any(|n| n == "citrus"));
    }

    #[test]
    fn notes_are_deduplicated_first_seen_wins() {
        let record = extract("Notes: chocolate, chocolate, chocolate fudge");
        let notes = record.flavor_profile.expect("profile").notes;
        assert_eq!(notes.iter().filter(|n| *n == "chocolate").count(), 1);
    }

    #[test]
    fn processing_method_from_vocabulary() {
        let record = extract("A classic washed lot.");
        assert_eq!(record.processing_method.as_deref(), Some("washed"));
    }

    #[test]
    fn processing_label_has_priority_over_vocabulary() {
        let record = extract("Processed: anaerobic fermentation, though it drinks like a natural");
        assert_eq!(
            record.processing_method.as_deref(),
            Some("anaerobic fermentation")
        );
    }

    #[test]
    fn brew_method_stored_as_single_element_list() {
        let record = extract("Shines as espresso with a little milk.");
        assert_eq!(record.brewing_methods, vec!["espresso".to_string()]);
    }

    #[test]
    fn acidity_and_body_buckets_first_priority_wins() {
        let record = extract("Bright yet balanced, with a rich full body.");
        let profile = record.flavor_profile.expect("profile");
        assert_eq!(profile.acidity.as_deref(), Some("Bright"));
        assert_eq!(profile.body.as_deref(), Some("Full"));
    }

    #[test]
    fn acidity_absent_leaves_field_unset() {
        let record = extract("Notes: chocolate bar");
        let profile = record.flavor_profile.expect("profile");
        assert!(profile.acidity.is_none());
        assert!(profile.body.is_none());
    }

    #[test]
    fn rating_counts_distinct_positive_words_once() {
        let record = extract("Exceptional, truly exceptional and outstanding.");
        // Two distinct positive words: 4.5 + 0.2.
        assert_rating(record.overall_rating, 4.7);
    }

    #[test]
    fn rating_is_clamped_at_five() {
        let record = extract(
            "exceptional outstanding premium exquisite remarkable distinctive complex balanced expertly artisanal",
        );
        assert_rating(record.overall_rating, 5.0);
    }

    #[test]
    fn extraction_is_idempotent() {
        let text = "Circle number 2 is filled. Origin: Peru. Notes: berry, floral. Expertly roasted, balanced.";
        let first = extract(text);
        let second = extract(text);
        assert_eq!(first, second);
    }
}
