use crate::domain::model::City;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static ARRONDISSEMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(paris|lyon|marseille) \d{1,2}( ?(er|e|eme|ieme))?( arrondissement)?$")
        .expect("valid arrondissement regex")
});
static PARENTHESIS_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*\)\s*$").expect("valid suffix regex"));

fn fold_char(c: char, out: &mut String) {
    match c {
        'à' | 'â' | 'ä' | 'á' => out.push('a'),
        'ç' => out.push('c'),
        'é' | 'è' | 'ê' | 'ë' => out.push('e'),
        'î' | 'ï' | 'í' => out.push('i'),
        'ô' | 'ö' | 'ó' => out.push('o'),
        'ù' | 'û' | 'ü' | 'ú' => out.push('u'),
        'ÿ' => out.push('y'),
        'œ' => out.push_str("oe"),
        'æ' => out.push_str("ae"),
        '-' | '\'' | '’' | '_' => out.push(' '),
        other => out.push(other),
    }
}

/// 城市名稱正規化，讓爬取的名稱能對上參考資料
pub fn normalize_city_name(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let without_suffix = PARENTHESIS_SUFFIX_RE.replace(&collapsed, "");

    let mut folded = String::with_capacity(without_suffix.len());
    for c in without_suffix.to_lowercase().chars() {
        fold_char(c, &mut folded);
    }

    let mut words: Vec<&str> = folded.split_whitespace().collect();
    if let Some(first) = words.first_mut() {
        *first = match *first {
            "st" => "saint",
            "ste" => "sainte",
            other => other,
        };
    }
    let name = words.join(" ");

    match ARRONDISSEMENT_RE.captures(&name) {
        Some(caps) => caps[1].to_string(),
        None => name,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CityMatch<'a> {
    Unique(&'a City),
    Ambiguous { city: &'a City, candidates: usize },
    Missing,
}

impl<'a> CityMatch<'a> {
    pub fn city(&self) -> Option<&'a City> {
        match self {
            CityMatch::Unique(city) | CityMatch::Ambiguous { city, .. } => Some(*city),
            CityMatch::Missing => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct CityIndex {
    by_name: HashMap<String, Vec<City>>,
    len: usize,
}

impl CityIndex {
    /// Rows sharing an INSEE code collapse to their first occurrence.
    pub fn build(cities: Vec<City>) -> Self {
        let mut seen_codes = HashSet::new();
        let mut by_name: HashMap<String, Vec<City>> = HashMap::new();
        let mut len = 0;

        for city in cities {
            if !seen_codes.insert(city.insee_code.clone()) {
                continue;
            }
            let key = normalize_city_name(&city.name);
            if key.is_empty() {
                continue;
            }
            by_name.entry(key).or_default().push(city);
            len += 1;
        }

        for candidates in by_name.values_mut() {
            candidates.sort_by(|a, b| a.insee_code.cmp(&b.insee_code));
        }

        Self { by_name, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn lookup(&self, name: &str, preferred_departments: &[String]) -> CityMatch<'_> {
        let Some(candidates) = self.by_name.get(&normalize_city_name(name)) else {
            return CityMatch::Missing;
        };

        match candidates.as_slice() {
            [] => CityMatch::Missing,
            [only] => CityMatch::Unique(only),
            all => {
                let preferred: Vec<&City> = all
                    .iter()
                    .filter(|c| {
                        c.department_code
                            .as_ref()
                            .is_some_and(|code| preferred_departments.contains(code))
                    })
                    .collect();

                // 同名仍算 ambiguous，即使偏好省份只剩一個
                CityMatch::Ambiguous {
                    city: preferred.first().copied().unwrap_or(&all[0]),
                    candidates: all.len(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city(name: &str, insee: &str, dep: &str) -> City {
        City {
            name: name.to_string(),
            insee_code: insee.to_string(),
            postal_code: None,
            department_code: Some(dep.to_string()),
            department_name: None,
            region_name: None,
            latitude: Some(48.8),
            longitude: Some(2.4),
        }
    }

    #[test]
    fn test_normalize_city_name() {
        assert_eq!(normalize_city_name("  Saint-Maur-des-Fossés "), "saint maur des fosses");
        assert_eq!(normalize_city_name("St Germain en Laye"), "saint germain en laye");
        assert_eq!(normalize_city_name("L'Haÿ-les-Roses"), "l hay les roses");
        assert_eq!(normalize_city_name("Meaux (77)"), "meaux");
        assert_eq!(normalize_city_name("Paris 15e"), "paris");
        assert_eq!(normalize_city_name("Paris 01"), "paris");
        assert_eq!(normalize_city_name("Paris 1er Arrondissement"), "paris");
        assert_eq!(normalize_city_name("Marseille 8ème"), "marseille");
        assert_eq!(normalize_city_name("Boulogne-Billancourt"), "boulogne billancourt");
    }

    #[test]
    fn test_lookup_unique_and_missing() {
        let index = CityIndex::build(vec![
            city("Vincennes", "94080", "94"),
            city("Vincennes", "94080", "94"),
            city("Évry-Courcouronnes", "91228", "91"),
        ]);
        assert_eq!(index.len(), 2);

        assert!(matches!(index.lookup("VINCENNES", &[]), CityMatch::Unique(c) if c.insee_code == "94080"));
        assert!(matches!(index.lookup("evry courcouronnes", &[]), CityMatch::Unique(_)));
        assert_eq!(index.lookup("Lyon", &[]), CityMatch::Missing);
    }

    #[test]
    fn test_lookup_ambiguous_prefers_departments() {
        let index = CityIndex::build(vec![
            city("Saint-Martin", "05156", "05"),
            city("Saint-Martin", "32381", "32"),
            city("Moret-sur-Loing", "77316", "77"),
            city("Moret-sur-Loing", "01234", "01"),
        ]);
        let idf = vec!["77".to_string(), "75".to_string()];

        match index.lookup("Saint Martin", &idf) {
            CityMatch::Ambiguous { city, candidates } => {
                assert_eq!(city.insee_code, "05156");
                assert_eq!(candidates, 2);
            }
            other => panic!("unexpected match: {:?}", other),
        }

        match index.lookup("Moret sur Loing", &idf) {
            CityMatch::Ambiguous { city, candidates } => {
                assert_eq!(city.insee_code, "77316");
                assert_eq!(candidates, 2);
            }
            other => panic!("unexpected match: {:?}", other),
        }
    }
}
