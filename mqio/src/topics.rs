//! Topic layout under the configured prefix `P`.
//!
//! ```text
//! P/status                      running | stopped | dead (retained)
//! P/output/<name>               current output payload
//! P/output/<name>/set           on/off payload
//! P/output/<name>/set_on_ms     pulse on for N ms
//! P/output/<name>/set_off_ms    pulse off for N ms
//! P/input/<name>                input payload (retained)
//! P/sensor/<name>               rounded sensor value
//! ```

use mqio_common::consts::{
    INPUT_TOPIC, OUTPUT_TOPIC, SENSOR_TOPIC, SET_OFF_MS_SUFFIX, SET_ON_MS_SUFFIX, SET_SUFFIX,
};

use crate::error::TopicError;

/// Kind of request carried by an inbound output topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputRequest {
    Set,
    SetOnMs,
    SetOffMs,
}

impl OutputRequest {
    pub const ALL: [OutputRequest; 3] = [Self::Set, Self::SetOnMs, Self::SetOffMs];

    /// Last topic segment of this request kind.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Set => SET_SUFFIX,
            Self::SetOnMs => SET_ON_MS_SUFFIX,
            Self::SetOffMs => SET_OFF_MS_SUFFIX,
        }
    }

    /// Classify a topic by its suffix. `None` for anything else.
    pub fn from_topic(topic: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|request| {
            topic
                .strip_suffix(request.suffix())
                .is_some_and(|head| head.ends_with('/'))
        })
    }
}

pub fn status_topic(prefix: &str, status: &str) -> String {
    format!("{prefix}/{status}")
}

pub fn output_topic(prefix: &str, name: &str) -> String {
    format!("{prefix}/{OUTPUT_TOPIC}/{name}")
}

pub fn output_request_topic(prefix: &str, name: &str, request: OutputRequest) -> String {
    format!("{prefix}/{OUTPUT_TOPIC}/{name}/{}", request.suffix())
}

pub fn input_topic(prefix: &str, name: &str) -> String {
    format!("{prefix}/{INPUT_TOPIC}/{name}")
}

pub fn sensor_topic(prefix: &str, name: &str) -> String {
    format!("{prefix}/{SENSOR_TOPIC}/{name}")
}

/// Extract `<name>` from `<prefix>/output/<name>/<rest>`.
///
/// The name is everything up to the next `/`; it must be non-empty and be
/// followed by a non-empty remainder.
///
/// # Errors
/// Returns [`TopicError`] when the topic has another prefix, lacks the
/// name segment or ends right after it.
pub fn output_name_from_topic<'a>(topic: &'a str, prefix: &str) -> Result<&'a str, TopicError> {
    let expected = format!("{prefix}/{OUTPUT_TOPIC}/");
    topic
        .strip_prefix(expected.as_str())
        .and_then(|rest| rest.split_once('/'))
        .filter(|(name, tail)| !name.is_empty() && !tail.is_empty())
        .map(|(name, _)| name)
        .ok_or_else(|| TopicError {
            topic: topic.to_string(),
            expected,
        })
}
