use std::sync::OnceLock;

use regex::Regex;

/// Per-language profile: which titles are list-, date-, or index-like pages
/// that should never be recommended
pub struct LangProfile {
    pub code: &'static str,
    exclusions: Vec<Regex>,
}

impl LangProfile {
    fn new(code: &'static str, patterns: &[&str]) -> Self {
        let exclusions = patterns
            .iter()
            .map(|p| Regex::new(p).expect("invalid exclusion pattern"))
            .collect();
        Self { code, exclusions }
    }

    /// Whether the title looks like a list/index/date page
    pub fn excluded(&self, title: &str) -> bool {
        self.exclusions.iter().any(|re| re.is_match(title))
    }
}

fn profiles() -> &'static Vec<LangProfile> {
    static PROFILES: OnceLock<Vec<LangProfile>> = OnceLock::new();
    PROFILES.get_or_init(|| {
        vec![
            LangProfile::new(
                "en",
                &[
                    r"^(List|Lists|Index|Outline) of ",
                    r"\(disambiguation\)$",
                    // Year and decade pages: "1984", "1980s", "44 BC"
                    r"^\d{1,4}s?( (BC|AD))?$",
                    // Month, day-of-month and month-of-year pages
                    r"^(January|February|March|April|May|June|July|August|September|October|November|December)( \d{1,2}| \d{4})?$",
                ],
            ),
            LangProfile::new(
                "no",
                &[
                    r"^Liste over ",
                    r"\(andre betydninger\)$",
                    r"^\d{1,4}s?( f\.Kr\.)?$",
                    r"^(Januar|Februar|Mars|April|Mai|Juni|Juli|August|September|Oktober|November|Desember)( \d{4})?$",
                ],
            ),
            LangProfile::new(
                "sv",
                &[
                    r"^Lista över ",
                    r"\(olika betydelser\)$",
                    r"^\d{1,4}s?( f\.Kr\.)?$",
                    r"^(Januari|Februari|Mars|April|Maj|Juni|Juli|Augusti|September|Oktober|November|December)( \d{4})?$",
                ],
            ),
        ]
    })
}

/// Looks up the profile for a language code; `None` means unsupported
pub fn profile(code: &str) -> Option<&'static LangProfile> {
    profiles().iter().find(|p| p.code == code)
}
