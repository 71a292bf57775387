//! Day-of-week gate evaluated once per run.
//!
//! Tokens follow a Sunday-based numbering: `0` Sunday, `1` Monday up to
//! `6` Saturday. `7` is accepted as a second name for Sunday. `*` matches
//! every day. Tokens are separated by whitespace or commas.

use chrono::Weekday;

pub static EVERY_DAY: &str = "*";

/// Splits a days-of-week string into its tokens.
pub fn tokens(spec: &str) -> impl Iterator<Item = &str> {
    spec.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
}

/// Weekday named by a numeric token, `None` for anything else.
pub fn weekday_of_token(token: &str) -> Option<Weekday> {
    match token {
        "0" | "7" => Some(Weekday::Sun),
        "1" => Some(Weekday::Mon),
        "2" => Some(Weekday::Tue),
        "3" => Some(Weekday::Wed),
        "4" => Some(Weekday::Thu),
        "5" => Some(Weekday::Fri),
        "6" => Some(Weekday::Sat),
        _ => None,
    }
}

pub fn is_valid_token(token: &str) -> bool {
    token == EVERY_DAY || weekday_of_token(token).is_some()
}

pub fn is_eligible(today: Weekday, spec: &str) -> bool {
    tokens(spec).any(|t| t == EVERY_DAY || weekday_of_token(t) == Some(today))
}
