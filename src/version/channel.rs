//! Toolchain channel versions: `stable`, `beta`, `nightly-2023-12-25`

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Release channel of a toolchain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Daily builds
    Nightly,
    /// Pre-release train
    Beta,
    /// Stable releases
    Stable,
}

impl Channel {
    fn parse(input: &str) -> Option<Self> {
        match input {
            "nightly" => Some(Channel::Nightly),
            "beta" => Some(Channel::Beta),
            "stable" => Some(Channel::Stable),
            _ => None,
        }
    }

    /// Channel name as written in manifests
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Nightly => "nightly",
            Channel::Beta => "beta",
            Channel::Stable => "stable",
        }
    }
}

/// A channel optionally pinned to a build date
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelVersion {
    channel: Channel,
    date: Option<NaiveDate>,
}

impl ChannelVersion {
    /// Parse `channel` or `channel-YYYY-MM-DD`
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let (name, date) = match input.split_once('-') {
            Some((name, date)) => (name, Some(date)),
            None => (input, None),
        };
        let channel = Channel::parse(name)?;
        let date = match date {
            Some(d) => Some(NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()?),
            None => None,
        };
        Some(Self { channel, date })
    }

    /// The release channel
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// The pinned build date, if any
    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }
}

impl PartialOrd for ChannelVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ChannelVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        // An undated channel tracks the newest build, so it sorts last.
        self.channel
            .cmp(&other.channel)
            .then_with(|| match (self.date, other.date) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    }
}

impl fmt::Display for ChannelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.date {
            Some(date) => write!(f, "{}-{}", self.channel.as_str(), date.format("%Y-%m-%d")),
            None => write!(f, "{}", self.channel.as_str()),
        }
    }
}
