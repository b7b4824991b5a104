use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

// (lowercase, uppercase, latin)
const CYRILLIC: &[(char, char, &str)] = &[
    ('а', 'А', "a"),
    ('б', 'Б', "b"),
    ('в', 'В', "v"),
    ('г', 'Г', "g"),
    ('ґ', 'Ґ', "g"),
    ('д', 'Д', "d"),
    ('е', 'Е', "e"),
    ('ё', 'Ё', "yo"),
    ('є', 'Є', "ye"),
    ('ж', 'Ж', "zh"),
    ('з', 'З', "z"),
    ('и', 'И', "i"),
    ('і', 'І', "i"),
    ('ї', 'Ї', "yi"),
    ('й', 'Й', "y"),
    ('к', 'К', "k"),
    ('л', 'Л', "l"),
    ('м', 'М', "m"),
    ('н', 'Н', "n"),
    ('о', 'О', "o"),
    ('п', 'П', "p"),
    ('р', 'Р', "r"),
    ('с', 'С', "s"),
    ('т', 'Т', "t"),
    ('у', 'У', "u"),
    ('ф', 'Ф', "f"),
    ('х', 'Х', "h"),
    ('ц', 'Ц', "ts"),
    ('ч', 'Ч', "ch"),
    ('ш', 'Ш', "sh"),
    ('щ', 'Щ', "sch"),
    ('ъ', 'Ъ', ""),
    ('ы', 'Ы', "y"),
    ('ь', 'Ь', ""),
    ('э', 'Э', "e"),
    ('ю', 'Ю', "yu"),
    ('я', 'Я', "ya"),
];

lazy_static! {
    static ref TRANSLIT: HashMap<char, String> = {
        let mut map = HashMap::with_capacity(CYRILLIC.len() * 2);
        for &(lower, upper, latin) in CYRILLIC {
            map.insert(lower, latin.to_string());
            let mut chars = latin.chars();
            let capitalized = match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            };
            map.insert(upper, capitalized);
        }
        map
    };
    static ref NON_ALNUM_RE: Regex = Regex::new(r"[^A-Za-z0-9]+").unwrap();
}

/// Canonical search key for a product name: Cyrillic is transliterated to
/// Latin, everything outside `[A-Za-z0-9]` is dropped, the rest lowercased.
///
/// Products are stored under this key and search terms go through the same
/// function, so the two sides always agree.
pub fn normalize_name(name: &str) -> String {
    let mut transliterated = String::with_capacity(name.len());
    for ch in name.chars() {
        match TRANSLIT.get(&ch) {
            Some(latin) => transliterated.push_str(latin),
            None => transliterated.push(ch),
        }
    }
    NON_ALNUM_RE
        .replace_all(&transliterated, "")
        .to_ascii_lowercase()
}
