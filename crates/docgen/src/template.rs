//! Hotel-shaped document template with byte-exact size targeting.

use crate::words;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Default serialized size when the caller does not specify one.
pub const DEFAULT_DOCUMENT_SIZE: usize = 1024;

/// Review timestamps fall in the ten years before this anchor so that a
/// seeded RNG reproduces documents byte for byte.
const DATE_ANCHOR_UNIX: i64 = 1_735_689_600; // 2025-01-01T00:00:00Z
const TEN_YEARS_SECS: i64 = 10 * 365 * 24 * 60 * 60;

static PRICES: [f64; 10] = [
    1000.0, 2000.0, 3000.0, 4000.0, 5000.0, 6000.0, 7000.0, 8000.0, 9000.0, 10000.0,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingTriple {
    pub value: i64,
    pub cleanliness: i64,
    pub overall: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub date: String,
    pub author: String,
    pub rating: RatingTriple,
}

/// One synthetic hotel record.
///
/// Field set mirrors what every loader writes regardless of backend; the
/// `padding` string absorbs whatever bytes remain below the size target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotel {
    pub document_size: usize,
    pub country: String,
    pub address: String,
    pub free_parking: i64,
    pub city: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub reviews: Vec<Review>,
    pub phone: String,
    pub price: f64,
    pub avg_rating: f64,
    pub free_breakfast: i64,
    pub name: String,
    pub public_likes: Vec<String>,
    pub email: String,
    pub mutated: f64,
    pub padding: String,
    pub key: Option<String>,
}

fn random_review<R: Rng + ?Sized>(rng: &mut R) -> Review {
    let ts = DATE_ANCHOR_UNIX - rng.random_range(0..TEN_YEARS_SECS);
    let date = chrono::DateTime::from_timestamp(ts, 0)
        .unwrap_or(chrono::DateTime::UNIX_EPOCH)
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string();
    Review {
        date,
        author: words::full_name(rng),
        rating: RatingTriple {
            value: rng.random_range(0..=10),
            cleanliness: rng.random_range(0..=10),
            overall: rng.random_range(1..=10),
        },
    }
}

fn serialized_len<T: Serialize>(value: &T) -> usize {
    serde_json::to_string(value).map(|s| s.len()).unwrap_or(0)
}

/// Synthesize one hotel record whose UTF-8 serialized length is
/// `size_bytes` (within one byte for encoding boundary cases).
///
/// Reviews are appended one at a time; before each append the serialized
/// length is measured and synthesis stops as soon as another review would
/// exceed the target. The residual gap is filled with a random
/// ASCII-letter `padding` string. Deterministic iff `rng` is seeded.
pub fn synthesize<R: Rng + ?Sized>(rng: &mut R, size_bytes: usize, key: Option<String>) -> Hotel {
    let num_likes = rng.random_range(0..=10);
    let mut hotel = Hotel {
        document_size: size_bytes,
        country: words::country(rng),
        address: words::street_address(rng),
        free_parking: i64::from(rng.random_bool(0.5)),
        city: words::city(rng),
        kind: "Hotel".to_string(),
        url: words::url(rng),
        reviews: Vec::new(),
        phone: words::phone(rng),
        price: PRICES.choose(rng).copied().unwrap_or(PRICES[0]),
        avg_rating: f64::from(rng.random_range(0..=90)) / 10.0,
        free_breakfast: i64::from(rng.random_bool(0.5)),
        name: words::full_name(rng),
        public_likes: (0..num_likes).map(|_| words::full_name(rng)).collect(),
        email: words::email(rng),
        mutated: 0.0,
        padding: String::new(),
        key,
    };

    loop {
        let review = random_review(rng);
        let current = serialized_len(&hotel);
        let review_len = serialized_len(&review);
        if current + review_len <= size_bytes {
            hotel.reviews.push(review);
        } else {
            let gap = size_bytes.saturating_sub(current);
            hotel.padding = words::letters(rng, gap);
            break;
        }
    }

    hotel
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_size_fidelity() {
        let mut rng = StdRng::seed_from_u64(42);
        for size in [1024usize, 2048, 4096] {
            let hotel = synthesize(&mut rng, size, None);
            let serialized = serde_json::to_string(&hotel).unwrap();
            let len = serialized.len();
            assert!(
                len.abs_diff(size) <= 1,
                "target {size}, got {len}"
            );
        }
    }

    #[test]
    fn test_padding_is_alphabetic() {
        let mut rng = StdRng::seed_from_u64(42);
        let hotel = synthesize(&mut rng, 2048, None);
        assert!(hotel.padding.chars().all(|c| c.is_ascii_alphabetic()));
    }

    #[test]
    fn test_reviews_fill_larger_documents() {
        let mut rng = StdRng::seed_from_u64(42);
        let small = synthesize(&mut rng, 800, None);
        let large = synthesize(&mut rng, 8192, None);
        assert!(large.reviews.len() > small.reviews.len());
        for review in &large.reviews {
            assert!((0..=10).contains(&review.rating.value));
            assert!((0..=10).contains(&review.rating.cleanliness));
            assert!((1..=10).contains(&review.rating.overall));
        }
    }

    #[test]
    fn test_seeded_synthesis_is_deterministic() {
        let a = synthesize(&mut StdRng::seed_from_u64(7), 1500, None);
        let b = synthesize(&mut StdRng::seed_from_u64(7), 1500, None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_is_carried() {
        let mut rng = StdRng::seed_from_u64(42);
        let hotel = synthesize(&mut rng, 1024, Some("doc-17".to_string()));
        assert_eq!(hotel.key.as_deref(), Some("doc-17"));
    }

    #[test]
    fn test_price_from_fixed_set() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            let hotel = synthesize(&mut rng, 1024, None);
            assert!(PRICES.contains(&hotel.price));
        }
    }
}
