//! Canonical region registry: the 85 federal subjects, federal-district
//! expansion and text/INN normalisation.
//!
//! Everything here is pure and infallible. Input that cannot be mapped to a
//! canonical subject yields `None`; raw garbage is never passed through.

mod data;

use std::collections::HashMap;

use strsim::jaro_winkler;

pub use data::{ALIASES, FEDERAL_DISTRICTS, INN_PREFIXES};

/// Similarity floor for the fuzzy fallback. High on purpose: a wrong region
/// hard-rejects tenders downstream, a missed one only costs a bonus.
const FUZZY_THRESHOLD: f64 = 0.93;

/// Address tokens that carry no region information and are stripped before
/// lookup.
const NOISE_TOKENS: &[&str] = &[
    "г", "гор", "город", "ул", "улица", "пр-кт", "проспект", "пер", "переулок", "б-р", "бульвар",
    "р-н", "район", "д", "дом", "стр", "строение", "корп", "корпус", "кв", "офис", "оф",
];

pub struct RegionRegistry {
    canonical: Vec<String>,
    /// folded name or alias -> canonical
    lookup: HashMap<String, String>,
    /// token-sorted folded name -> canonical, for inverted word order
    sorted_lookup: HashMap<String, String>,
    /// (folded tokens, canonical), longest names first, for in-text scan
    scan_candidates: Vec<(Vec<String>, String)>,
    /// folded district key -> member subjects
    districts: HashMap<String, Vec<String>>,
    district_of: HashMap<String, String>,
    inn_prefixes: HashMap<&'static str, &'static str>,
}

impl Default for RegionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionRegistry {
    pub fn new() -> Self {
        let mut canonical = Vec::new();
        let mut lookup = HashMap::new();
        let mut sorted_lookup = HashMap::new();
        let mut scan_candidates: Vec<(Vec<String>, String)> = Vec::new();
        let mut districts: HashMap<String, Vec<String>> = HashMap::new();
        let mut district_of = HashMap::new();

        for (district, code, members) in FEDERAL_DISTRICTS {
            let member_names: Vec<String> = members.iter().map(|m| m.to_string()).collect();
            districts.insert(fold_join(district), member_names.clone());
            districts.insert(fold_join(code), member_names.clone());
            districts.insert(
                format!("{} федеральный округ", fold_join(district)),
                member_names.clone(),
            );

            for member in *members {
                canonical.push(member.to_string());
                district_of.insert(member.to_string(), district.to_string());

                let tokens = fold_tokens(member);
                lookup.insert(tokens.join(" "), member.to_string());
                sorted_lookup.insert(sorted_key(&tokens), member.to_string());
                scan_candidates.push((tokens, member.to_string()));
            }
        }

        for (alias, target) in ALIASES {
            let tokens = fold_tokens(alias);
            lookup
                .entry(tokens.join(" "))
                .or_insert_with(|| target.to_string());
            scan_candidates.push((tokens, target.to_string()));
        }

        // Longer names take precedence in the in-text scan, so that
        // "московская область" is not swallowed by the "москва" alias.
        scan_candidates.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        Self {
            canonical,
            lookup,
            sorted_lookup,
            scan_candidates,
            districts,
            district_of,
            inn_prefixes: INN_PREFIXES.iter().copied().collect(),
        }
    }

    /// All 85 canonical subjects.
    pub fn all(&self) -> &[String] {
        &self.canonical
    }

    pub fn is_canonical(&self, name: &str) -> bool {
        self.canonical.iter().any(|c| c == name)
    }

    pub fn district_of(&self, region: &str) -> Option<&str> {
        self.district_of.get(region).map(String::as_str)
    }

    /// Maps free text (an official name, an alias, an address fragment or a
    /// customer-name tail) onto a canonical subject.
    ///
    /// A street or district component is not enough for a match: the text
    /// must contain the subject name (or a known alias) as whole words after
    /// address noise is stripped.
    pub fn normalise(&self, raw: &str) -> Option<String> {
        let tokens = fold_tokens(raw);
        if tokens.is_empty() {
            return None;
        }
        let joined = tokens.join(" ");

        if let Some(hit) = self.lookup.get(&joined) {
            return Some(hit.clone());
        }

        // Inverted word order: "Бурятия Республика" -> "Республика Бурятия".
        if tokens.len() > 1 {
            if let Some(hit) = self.sorted_lookup.get(&sorted_key(&tokens)) {
                return Some(hit.clone());
            }
        }

        // Whole-word scan inside longer text (customer names, addresses).
        for (candidate_tokens, target) in &self.scan_candidates {
            if contains_contiguous(&tokens, candidate_tokens) {
                return Some(target.clone());
            }
        }

        // Case-inflected single tokens: "Казани" resolves via "казань".
        // Same length guard as below, so "Петербургская" stays unmatched.
        let mut best_token: Option<(f64, &String)> = None;
        for token in &tokens {
            let token_len = token.chars().count() as i64;
            if token_len < 5 {
                continue;
            }
            for (candidate_tokens, target) in &self.scan_candidates {
                if candidate_tokens.len() != 1 {
                    continue;
                }
                let key = &candidate_tokens[0];
                let key_len = key.chars().count() as i64;
                if key_len < 5 || (token_len - key_len).abs() > 2 {
                    continue;
                }
                let score = jaro_winkler(token, key);
                if score >= FUZZY_THRESHOLD
                    && best_token.map(|(b, _)| score > b).unwrap_or(true)
                {
                    best_token = Some((score, target));
                }
            }
        }
        if let Some((_, target)) = best_token {
            return Some(target.clone());
        }

        // Typo tolerance for short standalone inputs only. The length guard
        // keeps adjectival street names ("Петербургская") from scoring as a
        // near-match of the subject they derive from.
        if tokens.len() <= 3 && joined.chars().count() >= 5 {
            let input_len = joined.chars().count() as i64;
            let mut best: Option<(f64, &String)> = None;
            for (key, target) in &self.lookup {
                if (input_len - key.chars().count() as i64).abs() > 2 {
                    continue;
                }
                let score = jaro_winkler(&joined, key);
                if score >= FUZZY_THRESHOLD
                    && best.map(|(b, _)| score > b).unwrap_or(true)
                {
                    best = Some((score, target));
                }
            }
            if let Some((_, target)) = best {
                return Some(target.clone());
            }
        }

        None
    }

    /// Region from the first two digits of a 10- or 12-digit INN.
    pub fn from_inn(&self, inn: &str) -> Option<String> {
        let inn = inn.trim();
        if !(inn.len() == 10 || inn.len() == 12) || !inn.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        self.inn_prefixes.get(&inn[..2]).map(|r| r.to_string())
    }

    /// Expands a federal district (by name or code) to its member subjects.
    /// Non-district input yields an empty list.
    pub fn expand_district(&self, name: &str) -> Vec<String> {
        self.districts
            .get(&fold_join(name))
            .cloned()
            .unwrap_or_default()
    }

    /// Parses comma-separated region input, expanding districts and
    /// normalising each entry. Returns `(recognised, unrecognised)`.
    pub fn parse_list(&self, input: &str) -> (Vec<String>, Vec<String>) {
        let mut recognised = Vec::new();
        let mut unrecognised = Vec::new();
        for part in input.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let expanded = self.expand_district(part);
            if !expanded.is_empty() {
                for region in expanded {
                    if !recognised.contains(&region) {
                        recognised.push(region);
                    }
                }
                continue;
            }
            match self.normalise(part) {
                Some(region) => {
                    if !recognised.contains(&region) {
                        recognised.push(region);
                    }
                }
                None => unrecognised.push(part.to_string()),
            }
        }
        (recognised, unrecognised)
    }
}

/// Lowercases, drops punctuation and digits, strips address noise and
/// expands the usual abbreviations.
fn fold_tokens(raw: &str) -> Vec<String> {
    let lowered: String = raw
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'ё' => 'е',
            c if c.is_alphabetic() || c == '-' => c,
            _ => ' ',
        })
        .collect();

    lowered
        .split_whitespace()
        .map(|t| t.trim_matches('-'))
        .filter(|t| !t.is_empty())
        .filter(|t| !NOISE_TOKENS.contains(t))
        .map(|t| match t {
            "респ" | "рес" => "республика".to_string(),
            "обл" => "область".to_string(),
            "авт" => "автономный".to_string(),
            "окр" => "округ".to_string(),
            other => other.to_string(),
        })
        .collect()
}

fn fold_join(raw: &str) -> String {
    fold_tokens(raw).join(" ")
}

fn sorted_key(tokens: &[String]) -> String {
    let mut sorted: Vec<&str> = tokens.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.join(" ")
}

fn contains_contiguous(haystack: &[String], needle: &[String]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack
        .windows(needle.len())
        .any(|window| window.iter().zip(needle).all(|(a, b)| a == b))
}
