use lazy_static::lazy_static;
use regex::Regex;

use crate::schema::TextFormat;

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$").unwrap();
    static ref URL_REGEX: Regex = Regex::new(r"^https?://[^\s/$.?#][^\s]*$").unwrap();
    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[1-9][0-9]{0,15}$").unwrap();
}

pub(crate) fn matches_format(format: TextFormat, text: &str) -> bool {
    match format {
        TextFormat::Email => EMAIL_REGEX.is_match(text),
        TextFormat::Url => URL_REGEX.is_match(text),
        TextFormat::Phone => PHONE_REGEX.is_match(text),
    }
}
