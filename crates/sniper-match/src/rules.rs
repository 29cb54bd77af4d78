//! Matcher vocabulary: synonyms, negative patterns, stop-words and the
//! short-keyword whitelist. Built-in tables cover the procurement domain;
//! a `rules/` directory with YAML files can override any of them.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Generic procurement nouns that never contribute positive score on their
/// own, no matter how often they appear in a filter.
const STOP_WORDS: &[&str] = &[
    "поставка",
    "закупка",
    "приобретение",
    "покупка",
    "снабжение",
    "услуга",
    "услуги",
    "работа",
    "работы",
    "товар",
    "товары",
    "система",
    "оказание",
    "выполнение",
    "проведение",
    "обеспечение",
    "организация",
];

/// Short keywords (under 3 characters) that are still meaningful in the
/// procurement domain. They match in exact word-boundary mode only.
const SHORT_WHITELIST: &[&str] = &[
    "по", "it", "ит", "ибп", "ас", "бд", "ос", "пк", "схд", "мфу", "эвм", "си",
];

/// Domain-noise phrases. Each hit costs 5 points, capped at 30 in total.
/// Three clusters: military, medical and construction/municipal niches that
/// frequently collide with generic equipment keywords.
const NEGATIVE_PATTERNS: &[&str] = &[
    // Military.
    "военн",
    "вооружен",
    "боеприпас",
    "оборонн",
    "ракетн",
    "торпедн",
    "патрон",
    "взрывчат",
    "бронетехник",
    "фортификацион",
    "воинск",
    "стрельбищ",
    // Medical.
    "лекарствен",
    "фармацевт",
    "вакцин",
    "шприц",
    "рентген",
    "томограф",
    "стоматологич",
    "протезн",
    "эндоскоп",
    "реанимацион",
    "хирургич",
    "офтальмологич",
    "кардиологич",
    "онкологич",
    "дезинфекц",
    "лечебн",
    "диагностикум",
    "медикамент",
    // Construction and municipal services.
    "капитальный ремонт",
    "капитального ремонта",
    "строительство здания",
    "реконструкц",
    "асфальтирован",
    "благоустройств",
    "сметной документации",
    "проектной документации",
    "изыскательск",
    "кадастров",
    "межеван",
    "снос здания",
    "демонтаж здания",
    "кровельн",
    "фасадн",
    "штукатурн",
    "дорожного покрытия",
    "дорожных знаков",
    "озеленен",
    "валка деревьев",
    "покос травы",
    // Services far from equipment procurement.
    "утилизация отходов",
    "вывоз мусора",
    "вывоз тко",
    "ритуальн",
    "похоронн",
    "охранные услуги",
    "клининг",
    "уборка помещений",
    "организация питания",
    "продукты питания",
    "горюче-смазочн",
    "дизельное топливо",
    "бензин",
    "уголь каменный",
    "комбикорм",
    "племенн",
    "ветеринарн",
    "лесозаготов",
    "страхован",
    "аудиторск",
    "юридические услуги",
    "образовательные услуги",
    "повышение квалификации",
    "аренда помещений",
    "перевозка пассажиров",
    "авиабилет",
];

/// Built-in synonym groups keyed by the filter keyword they expand.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("компьютер", &["ноутбук", "пк", "моноблок", "системный блок", "рабочая станция"]),
    ("ноутбук", &["портативный компьютер", "лэптоп", "мобильная рабочая станция"]),
    ("сервер", &["серверное оборудование", "вычислительный комплекс", "схд"]),
    ("принтер", &["мфу", "печатающее устройство", "оргтехника"]),
    ("программное обеспечение", &["лицензия", "программный продукт", "софт"]),
    ("канцелярия", &["канцтовары", "письменные принадлежности", "бумага офисная"]),
    ("мебель", &["столы", "стулья", "шкафы", "офисная мебель"]),
    ("медицина", &["медицинские", "здравоохранение", "больница", "поликлиника"]),
];

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct SynonymsFile {
    #[allow(dead_code)]
    version: u32,
    #[serde(default)]
    groups: Vec<SynonymGroup>,
}

#[derive(Debug, Clone, Deserialize)]
struct SynonymGroup {
    keyword: String,
    synonyms: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct PatternsFile {
    #[allow(dead_code)]
    version: u32,
    #[serde(default)]
    patterns: Vec<String>,
}

/// Vocabulary the matcher scores with.
#[derive(Debug, Clone)]
pub struct MatcherRules {
    pub synonyms: HashMap<String, Vec<String>>,
    pub negative_patterns: Vec<String>,
    pub stop_words: HashSet<String>,
    pub short_whitelist: HashSet<String>,
}

impl Default for MatcherRules {
    fn default() -> Self {
        Self {
            synonyms: SYNONYMS
                .iter()
                .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
                .collect(),
            negative_patterns: NEGATIVE_PATTERNS.iter().map(|s| s.to_string()).collect(),
            stop_words: STOP_WORDS.iter().map(|s| s.to_string()).collect(),
            short_whitelist: SHORT_WHITELIST.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl MatcherRules {
    /// Loads overrides from `<root>/rules/synonyms.yaml` and
    /// `<root>/rules/negative.yaml`. Missing files keep the built-ins.
    pub fn from_workspace_root(root: &Path) -> Result<Self, RulesError> {
        let mut rules = Self::default();
        let rules_dir = root.join("rules");

        let synonyms_path = rules_dir.join("synonyms.yaml");
        if synonyms_path.exists() {
            let text = std::fs::read_to_string(&synonyms_path).map_err(|source| RulesError::Io {
                path: synonyms_path.display().to_string(),
                source,
            })?;
            let file: SynonymsFile =
                serde_yaml::from_str(&text).map_err(|source| RulesError::Parse {
                    path: synonyms_path.display().to_string(),
                    source,
                })?;
            for group in file.groups {
                rules
                    .synonyms
                    .insert(group.keyword.to_lowercase(), group.synonyms);
            }
        }

        let negative_path = rules_dir.join("negative.yaml");
        if negative_path.exists() {
            let text = std::fs::read_to_string(&negative_path).map_err(|source| RulesError::Io {
                path: negative_path.display().to_string(),
                source,
            })?;
            let file: PatternsFile =
                serde_yaml::from_str(&text).map_err(|source| RulesError::Parse {
                    path: negative_path.display().to_string(),
                    source,
                })?;
            if !file.patterns.is_empty() {
                rules.negative_patterns = file.patterns;
            }
        }

        Ok(rules)
    }

    pub fn is_stop_word(&self, keyword: &str) -> bool {
        self.stop_words.contains(keyword)
    }

    pub fn is_whitelisted_short(&self, keyword: &str) -> bool {
        self.short_whitelist.contains(keyword)
    }
}
