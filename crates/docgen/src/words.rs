//! Word tables backing the locale-agnostic fake-data fields.

use rand::seq::IndexedRandom;
use rand::Rng;

static FIRST_NAMES: [&str; 24] = [
    "Ava", "Noah", "Mia", "Liam", "Zoe", "Ethan", "Ivy", "Lucas", "Nora", "Owen", "Ruby", "Eli",
    "Isla", "Felix", "Luna", "Hugo", "Cora", "Jude", "Elsa", "Marco", "Nina", "Oscar", "Pearl",
    "Silas",
];

static LAST_NAMES: [&str; 20] = [
    "Archer", "Bennett", "Calloway", "Dalton", "Ellis", "Foster", "Grant", "Hale", "Ingram",
    "Jensen", "Keller", "Lowell", "Mercer", "Nash", "Olsen", "Porter", "Quinn", "Reyes",
    "Sutton", "Thorne",
];

static CITIES: [&str; 16] = [
    "Lakeview", "Ashford", "Brookhaven", "Cedarport", "Dunmore", "Eastvale", "Fairholm",
    "Glenrock", "Harborton", "Ironwood", "Juniper", "Kingsfield", "Larkspur", "Mosswood",
    "Northgate", "Oakhurst",
];

static COUNTRIES: [&str; 14] = [
    "United States", "Canada", "Mexico", "Brazil", "France", "Germany", "Spain", "Italy",
    "Japan", "India", "Australia", "Norway", "Portugal", "Kenya",
];

static STREET_SUFFIXES: [&str; 8] = [
    "Street", "Avenue", "Boulevard", "Lane", "Drive", "Court", "Terrace", "Way",
];

static DOMAINS: [&str; 8] = [
    "example.com", "mailbox.org", "postbox.net", "inbox.io", "courier.dev", "relay.co",
    "lettermail.net", "parcel.org",
];

static WORDS: [&str; 24] = [
    "harbor", "meadow", "summit", "willow", "ember", "grove", "cascade", "prairie", "canyon",
    "breeze", "orchard", "lagoon", "tundra", "valley", "drift", "hollow", "ridge", "cove",
    "thicket", "marsh", "bluff", "dune", "glade", "shoal",
];

static ALPHABET: [char; 52] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r',
    's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J',
    'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, table: &'a [&'a str]) -> &'a str {
    table.choose(rng).copied().unwrap_or_default()
}

pub fn full_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{} {}", pick(rng, &FIRST_NAMES), pick(rng, &LAST_NAMES))
}

pub fn city<R: Rng + ?Sized>(rng: &mut R) -> String {
    pick(rng, &CITIES).to_string()
}

pub fn country<R: Rng + ?Sized>(rng: &mut R) -> String {
    pick(rng, &COUNTRIES).to_string()
}

pub fn street_address<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!(
        "{} {} {}",
        rng.random_range(1..9999),
        pick(rng, &LAST_NAMES),
        pick(rng, &STREET_SUFFIXES)
    )
}

pub fn email<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!(
        "{}.{}{}@{}",
        pick(rng, &FIRST_NAMES).to_lowercase(),
        pick(rng, &LAST_NAMES).to_lowercase(),
        rng.random_range(1..100),
        pick(rng, &DOMAINS)
    )
}

pub fn url<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("https://www.{}{}.com/", pick(rng, &WORDS), pick(rng, &WORDS))
}

pub fn phone<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!(
        "+1-{:03}-{:03}-{:04}",
        rng.random_range(200..1000),
        rng.random_range(200..1000),
        rng.random_range(0..10000)
    )
}

pub fn username<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!(
        "{}{}",
        pick(rng, &FIRST_NAMES).to_lowercase(),
        rng.random_range(10..1000)
    )
}

pub fn word<R: Rng + ?Sized>(rng: &mut R) -> String {
    pick(rng, &WORDS).to_string()
}

/// A random ASCII-letter string of exactly `len` bytes.
pub fn letters<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())])
        .collect()
}
