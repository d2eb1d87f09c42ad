//! Versioned lookup tables for country-name reconciliation.
//!
//! Canonical names follow the world-atlas country vocabulary used by the map
//! geometry. Every canonical name also resolves to itself so that a
//! case-mismatched spelling (`"india"`) still finds its canonical form.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Bumped whenever an alias or canonical name is added, removed, or remapped.
pub const ALIAS_TABLE_VERSION: u32 = 3;

/// Country names as they appear in the map geometry.
pub const CANONICAL_COUNTRIES: &[&str] = &[
    "Afghanistan",
    "Albania",
    "Algeria",
    "Angola",
    "Antarctica",
    "Argentina",
    "Armenia",
    "Australia",
    "Austria",
    "Azerbaijan",
    "Bahamas",
    "Bangladesh",
    "Belarus",
    "Belgium",
    "Belize",
    "Benin",
    "Bhutan",
    "Bolivia",
    "Bosnia and Herz.",
    "Botswana",
    "Brazil",
    "Brunei",
    "Bulgaria",
    "Burkina Faso",
    "Burundi",
    "Cambodia",
    "Cameroon",
    "Canada",
    "Central African Rep.",
    "Chad",
    "Chile",
    "China",
    "Colombia",
    "Congo",
    "Costa Rica",
    "Croatia",
    "Cuba",
    "Cyprus",
    "Czechia",
    "Côte d'Ivoire",
    "Dem. Rep. Congo",
    "Denmark",
    "Djibouti",
    "Dominican Rep.",
    "Ecuador",
    "Egypt",
    "El Salvador",
    "Eq. Guinea",
    "Eritrea",
    "Estonia",
    "Ethiopia",
    "Falkland Is.",
    "Fiji",
    "Finland",
    "Fr. S. Antarctic Lands",
    "France",
    "Gabon",
    "Gambia",
    "Georgia",
    "Germany",
    "Ghana",
    "Greece",
    "Greenland",
    "Guatemala",
    "Guinea",
    "Guinea-Bissau",
    "Guyana",
    "Haiti",
    "Honduras",
    "Hungary",
    "Iceland",
    "India",
    "Indonesia",
    "Iran",
    "Iraq",
    "Ireland",
    "Israel",
    "Italy",
    "Jamaica",
    "Japan",
    "Jordan",
    "Kazakhstan",
    "Kenya",
    "Kosovo",
    "Kuwait",
    "Kyrgyzstan",
    "Laos",
    "Latvia",
    "Lebanon",
    "Lesotho",
    "Liberia",
    "Libya",
    "Lithuania",
    "Luxembourg",
    "Macedonia",
    "Madagascar",
    "Malawi",
    "Malaysia",
    "Mali",
    "Mauritania",
    "Mexico",
    "Moldova",
    "Mongolia",
    "Montenegro",
    "Morocco",
    "Mozambique",
    "Myanmar",
    "N. Cyprus",
    "Namibia",
    "Nepal",
    "Netherlands",
    "New Caledonia",
    "New Zealand",
    "Nicaragua",
    "Niger",
    "Nigeria",
    "North Korea",
    "Norway",
    "Oman",
    "Pakistan",
    "Palestine",
    "Panama",
    "Papua New Guinea",
    "Paraguay",
    "Peru",
    "Philippines",
    "Poland",
    "Portugal",
    "Puerto Rico",
    "Qatar",
    "Romania",
    "Russia",
    "Rwanda",
    "S. Sudan",
    "Saudi Arabia",
    "Senegal",
    "Serbia",
    "Sierra Leone",
    "Singapore",
    "Slovakia",
    "Slovenia",
    "Solomon Is.",
    "Somalia",
    "Somaliland",
    "South Africa",
    "South Korea",
    "Spain",
    "Sri Lanka",
    "Sudan",
    "Suriname",
    "Sweden",
    "Switzerland",
    "Syria",
    "Taiwan",
    "Tajikistan",
    "Tanzania",
    "Thailand",
    "Timor-Leste",
    "Togo",
    "Trinidad and Tobago",
    "Tunisia",
    "Turkey",
    "Turkmenistan",
    "Uganda",
    "Ukraine",
    "United Arab Emirates",
    "United Kingdom",
    "United States of America",
    "Uruguay",
    "Uzbekistan",
    "Vanuatu",
    "Venezuela",
    "Vietnam",
    "W. Sahara",
    "Yemen",
    "Zambia",
    "Zimbabwe",
    "eSwatini",
];

/// Known alternate spellings mapped to their canonical name.
pub const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("USA", "United States of America"),
    ("US", "United States of America"),
    ("U.S.", "United States of America"),
    ("U.S.A.", "United States of America"),
    ("United States", "United States of America"),
    ("America", "United States of America"),
    ("UK", "United Kingdom"),
    ("U.K.", "United Kingdom"),
    ("Great Britain", "United Kingdom"),
    ("Britain", "United Kingdom"),
    ("England", "United Kingdom"),
    (
        "United Kingdom of Great Britain and Northern Ireland",
        "United Kingdom",
    ),
    ("UAE", "United Arab Emirates"),
    ("Russian Federation", "Russia"),
    ("Republic of Korea", "South Korea"),
    ("Korea, Republic of", "South Korea"),
    ("Korea", "South Korea"),
    ("Democratic People's Republic of Korea", "North Korea"),
    ("DPRK", "North Korea"),
    ("Democratic Republic of the Congo", "Dem. Rep. Congo"),
    ("DR Congo", "Dem. Rep. Congo"),
    ("DRC", "Dem. Rep. Congo"),
    ("Congo (Kinshasa)", "Dem. Rep. Congo"),
    ("Republic of the Congo", "Congo"),
    ("Congo (Brazzaville)", "Congo"),
    ("Czech Republic", "Czechia"),
    ("Ivory Coast", "Côte d'Ivoire"),
    ("Cote d'Ivoire", "Côte d'Ivoire"),
    ("Eswatini", "eSwatini"),
    ("Swaziland", "eSwatini"),
    ("Bosnia and Herzegovina", "Bosnia and Herz."),
    ("Bosnia", "Bosnia and Herz."),
    ("Central African Republic", "Central African Rep."),
    ("Dominican Republic", "Dominican Rep."),
    ("Equatorial Guinea", "Eq. Guinea"),
    ("South Sudan", "S. Sudan"),
    ("Solomon Islands", "Solomon Is."),
    ("Falkland Islands", "Falkland Is."),
    ("Western Sahara", "W. Sahara"),
    ("Northern Cyprus", "N. Cyprus"),
    ("North Macedonia", "Macedonia"),
    ("Republic of North Macedonia", "Macedonia"),
    ("East Timor", "Timor-Leste"),
    ("Timor Leste", "Timor-Leste"),
    ("Viet Nam", "Vietnam"),
    ("Iran, Islamic Republic of", "Iran"),
    ("Islamic Republic of Iran", "Iran"),
    ("Syrian Arab Republic", "Syria"),
    ("Lao PDR", "Laos"),
    ("Lao People's Democratic Republic", "Laos"),
    ("Burma", "Myanmar"),
    ("Türkiye", "Turkey"),
    ("Turkiye", "Turkey"),
    ("Republic of Moldova", "Moldova"),
    ("Moldova, Republic of", "Moldova"),
    ("United Republic of Tanzania", "Tanzania"),
    ("Tanzania, United Republic of", "Tanzania"),
    ("Bolivia (Plurinational State of)", "Bolivia"),
    ("Venezuela (Bolivarian Republic of)", "Venezuela"),
    ("Brunei Darussalam", "Brunei"),
    ("State of Palestine", "Palestine"),
    ("The Gambia", "Gambia"),
    ("The Bahamas", "Bahamas"),
    ("Holland", "Netherlands"),
    ("The Netherlands", "Netherlands"),
    ("Brasil", "Brazil"),
    ("Phillipines", "Philippines"),
    ("Phillippines", "Philippines"),
    ("Columbia", "Colombia"),
    ("Agentina", "Argentina"),
    ("Camaroon", "Cameroon"),
    ("Kazakstan", "Kazakhstan"),
    ("Kyrgyz Republic", "Kyrgyzstan"),
    ("Slovak Republic", "Slovakia"),
    ("Deutschland", "Germany"),
];

/// Immutable country alias lookup, shared between normalizers.
///
/// Built once from [`CANONICAL_COUNTRIES`] and [`COUNTRY_ALIASES`]; callers
/// that need extra aliases build a derived table with
/// [`AliasTable::with_country_alias`] rather than mutating a shared one.
#[derive(Debug, Clone)]
pub struct AliasTable {
    version: u32,
    exact: HashMap<String, String>,
    folded: HashMap<String, String>,
}

static BUILTIN: LazyLock<Arc<AliasTable>> = LazyLock::new(|| Arc::new(AliasTable::build()));

impl AliasTable {
    /// The shared built-in table.
    #[must_use]
    pub fn builtin() -> Arc<AliasTable> {
        Arc::clone(&BUILTIN)
    }

    fn build() -> Self {
        let mut table = Self {
            version: ALIAS_TABLE_VERSION,
            exact: HashMap::with_capacity(CANONICAL_COUNTRIES.len() + COUNTRY_ALIASES.len()),
            folded: HashMap::with_capacity(CANONICAL_COUNTRIES.len() + COUNTRY_ALIASES.len()),
        };
        for name in CANONICAL_COUNTRIES {
            table.insert(name, name);
        }
        for (alias, canonical) in COUNTRY_ALIASES {
            table.insert(alias, canonical);
        }
        table
    }

    fn insert(&mut self, alias: &str, canonical: &str) {
        self.exact.insert(alias.to_owned(), canonical.to_owned());
        self.folded
            .insert(alias.to_lowercase(), canonical.to_owned());
    }

    /// Returns a copy of this table with one extra alias.
    #[must_use]
    pub fn with_country_alias(&self, alias: &str, canonical: &str) -> Self {
        let mut table = self.clone();
        table.insert(alias, canonical);
        table
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Case-sensitive lookup.
    #[must_use]
    pub fn exact(&self, raw: &str) -> Option<&str> {
        self.exact.get(raw).map(String::as_str)
    }

    /// Case-insensitive lookup; `raw` is folded before matching.
    #[must_use]
    pub fn folded(&self, raw: &str) -> Option<&str> {
        self.folded.get(&raw.to_lowercase()).map(String::as_str)
    }

    /// Number of distinct spellings the table recognizes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.exact.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }
}
