//! Value sources for the instance generator

use chrono::{DateTime, Duration, FixedOffset, Offset, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::graph::{NumberValidator, StringValidator};

/// Width of the range sampled when a numeric bound is missing
const SPAN: f64 = 100_000.0;

/// Longest run a regex repetition (`*`, `+`, `{n,}`) expands to
const MAX_REPEAT: u32 = 8;

/// Tries before a regex-driven value gives up on the length bounds
const ATTEMPTS: usize = 16;

const LOREM: [&str; 16] = [
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do", "eiusmod",
    "tempor", "incididunt", "ut", "labore", "magna",
];

/// Supplies primitive values while the generator walks a class
pub trait ValueGenerator {
    fn boolean(&mut self) -> bool;

    fn integer(&mut self, validator: Option<&NumberValidator>) -> i64;

    fn long(&mut self, validator: Option<&NumberValidator>) -> i64 {
        self.integer(validator)
    }

    fn double(&mut self, validator: Option<&NumberValidator>) -> f64;

    fn date_time(&mut self) -> DateTime<FixedOffset>;

    fn string(&mut self, validator: Option<&StringValidator>) -> String;

    /// Index of the enum value to use, `len` is never zero
    fn enum_index(&mut self, len: usize) -> usize;

    /// Elements generated for array fields and entries for maps
    fn array_length(&mut self) -> usize;

    fn identifier(&mut self, validator: Option<&StringValidator>) -> String;
}

/// Zero values: `false`, `0` (clamped into bounds), `""`, empty arrays and
/// the first enum value. Regex-validated strings are still generated so
/// the instance validates.
pub struct EmptyValueGenerator {
    rng: StdRng,
}

impl EmptyValueGenerator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::seed_from_u64(0),
        }
    }
}

impl Default for EmptyValueGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueGenerator for EmptyValueGenerator {
    fn boolean(&mut self) -> bool {
        false
    }

    fn integer(&mut self, validator: Option<&NumberValidator>) -> i64 {
        let (lower, upper) = integer_bounds(validator);
        0.clamp(lower, upper)
    }

    fn double(&mut self, validator: Option<&NumberValidator>) -> f64 {
        let (lower, upper) = bounds(validator);
        0.0_f64.clamp(lower, upper)
    }

    fn date_time(&mut self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&Utc.fix())
    }

    fn string(&mut self, validator: Option<&StringValidator>) -> String {
        validator
            .and_then(|v| regex_sample(&mut self.rng, v))
            .unwrap_or_else(|| fit_length(String::new(), validator))
    }

    fn enum_index(&mut self, _len: usize) -> usize {
        0
    }

    fn array_length(&mut self) -> usize {
        0
    }

    fn identifier(&mut self, validator: Option<&StringValidator>) -> String {
        validator
            .and_then(|v| regex_sample(&mut self.rng, v))
            .unwrap_or_else(|| fit_length("0000".to_string(), validator))
    }
}

/// Random values within declared bounds. Seeded generators are reproducible.
pub struct SampleValueGenerator {
    rng: StdRng,
}

impl SampleValueGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    fn words(&mut self) -> String {
        let count = self.rng.gen_range(1..=5);
        (0..count)
            .map(|_| LOREM[self.rng.gen_range(0..LOREM.len())])
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl ValueGenerator for SampleValueGenerator {
    fn boolean(&mut self) -> bool {
        self.rng.gen()
    }

    fn integer(&mut self, validator: Option<&NumberValidator>) -> i64 {
        let (lower, upper) = integer_bounds(validator);
        self.rng.gen_range(lower..=upper)
    }

    fn double(&mut self, validator: Option<&NumberValidator>) -> f64 {
        let (lower, upper) = bounds(validator);
        if lower >= upper {
            return lower;
        }
        self.rng.gen_range(lower..=upper)
    }

    fn date_time(&mut self) -> DateTime<FixedOffset> {
        let base = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).single().unwrap_or_else(Utc::now);
        let offset = Duration::seconds(self.rng.gen_range(0..5 * 365 * 24 * 3600));
        (base + offset).with_timezone(&Utc.fix())
    }

    fn string(&mut self, validator: Option<&StringValidator>) -> String {
        if let Some(value) = validator.and_then(|v| regex_sample(&mut self.rng, v)) {
            return value;
        }
        let words = self.words();
        fit_length(words, validator)
    }

    fn enum_index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len.max(1))
    }

    fn array_length(&mut self) -> usize {
        1
    }

    fn identifier(&mut self, validator: Option<&StringValidator>) -> String {
        if let Some(value) = validator.and_then(|v| regex_sample(&mut self.rng, v)) {
            return value;
        }
        let id = format!("{:04}", self.rng.gen_range(0..10_000));
        fit_length(id, validator)
    }
}

fn bounds(validator: Option<&NumberValidator>) -> (f64, f64) {
    let lower = validator.and_then(NumberValidator::lower);
    let upper = validator.and_then(NumberValidator::upper);
    match (lower, upper) {
        (Some(lower), Some(upper)) => (lower, upper),
        (Some(lower), None) => (lower, lower + SPAN),
        (None, Some(upper)) => (upper - SPAN, upper),
        (None, None) => (-SPAN, SPAN),
    }
}

fn integer_bounds(validator: Option<&NumberValidator>) -> (i64, i64) {
    let (lower, upper) = bounds(validator);
    let lower = lower.ceil() as i64;
    let upper = (upper.floor() as i64).max(lower);
    (lower, upper)
}

/// A value matching the validator's pattern and length, if one turns up
fn regex_sample(rng: &mut StdRng, validator: &StringValidator) -> Option<String> {
    let pattern = validator.inline_pattern()?;
    let generator = rand_regex::Regex::compile(&strip_anchors(&pattern), MAX_REPEAT).ok()?;
    (0..ATTEMPTS)
        .map(|_| rng.sample::<String, _>(&generator))
        .find(|value| validator.validate("$", value).is_ok())
}

/// Drop a leading `^` (after any inline flag group) and a trailing `$`
fn strip_anchors(pattern: &str) -> String {
    let (flags, body) = match pattern.strip_prefix("(?") {
        Some(rest) => match rest.find(')') {
            Some(end) if !rest[..end].contains(':') => pattern.split_at(end + 3),
            _ => ("", pattern),
        },
        None => ("", pattern),
    };
    let body = body.strip_prefix('^').unwrap_or(body);
    let body = match body.strip_suffix('$') {
        Some(trimmed) if !trimmed.ends_with('\\') => trimmed,
        _ => body,
    };
    format!("{}{}", flags, body)
}

/// Pad with filler words up to the minimum length, then cut to the maximum
fn fit_length(mut text: String, validator: Option<&StringValidator>) -> String {
    let Some(validator) = validator else {
        return text;
    };
    if let Some(min) = validator.min_length() {
        let mut filler = LOREM.iter().cycle();
        while text.chars().count() < min {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(filler.next().copied().unwrap_or("x"));
        }
    }
    if let Some(max) = validator.max_length() {
        if text.chars().count() > max {
            text = text.chars().take(max).collect();
        }
    }
    text
}
