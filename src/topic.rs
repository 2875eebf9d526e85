//! The pub/sub topic namespace.
//!
//! Write topics look like `<base>D5/value/set`, read topics like
//! `<base>A2/value/get`. `D`/`A` are the digital/analog tokens.

use crate::pin::{PinId, PinKind};

const WRITE_SUFFIX: &str = "/value/set";
const READ_SUFFIX: &str = "/value/get";

/// A compiled matcher over the configured topic namespace.
#[derive(Debug, Clone)]
pub struct TopicSpec {
    base: String,
}

impl TopicSpec {
    /// Compile a spec from a base topic.
    /// A missing trailing separator is added.
    pub fn new(base: &str) -> Self {
        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };

        Self { base }
    }

    /// The normalized base topic, always ending with a separator.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The topic filter covering the whole namespace.
    pub fn subscription_filter(&self) -> String {
        format!("{}#", self.base)
    }

    /// Match a write topic of the given kind, yielding the pin.
    ///
    /// Anything malformed (wrong prefix, wrong suffix, an index which
    /// does not parse as an integer) is a non-match, never an error.
    pub fn match_write(&self, kind: PinKind, topic: &str) -> Option<PinId> {
        let index = topic
            .strip_prefix(&self.base)?
            .strip_prefix(kind.topic_token())?
            .strip_suffix(WRITE_SUFFIX)?;

        let index = try_parse_pin(index)?;

        Some(PinId { kind, index })
    }

    /// The topic a state change for `pin` is published on.
    pub fn read_topic(&self, pin: PinId) -> String {
        format!(
            "{}{}{}{READ_SUFFIX}",
            self.base,
            pin.kind.topic_token(),
            pin.index
        )
    }
}

/// Integer or no match. Malformed numeric text is a non-match, not an error.
fn try_parse_pin(text: &str) -> Option<u32> {
    text.parse().ok()
}

/// The lenient boolean parse used for digital write payloads: any
/// case-insensitive `true` is true, everything else (garbage included)
/// is false. Deliberately permissive, kept for compatibility.
pub fn parse_lenient_bool(payload: &str) -> bool {
    payload.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn spec() -> TopicSpec {
        TopicSpec::new("home/devices/ardulink/")
    }

    #[test]
    fn digital_write_matches() {
        assert_eq!(
            spec().match_write(PinKind::Digital, "home/devices/ardulink/D12/value/set"),
            Some(PinId::digital(12))
        );
    }

    #[test]
    fn analog_write_matches() {
        assert_eq!(
            spec().match_write(PinKind::Analog, "home/devices/ardulink/A0/value/set"),
            Some(PinId::analog(0))
        );
    }

    #[test]
    fn kinds_do_not_cross_match() {
        assert_eq!(
            spec().match_write(PinKind::Analog, "home/devices/ardulink/D12/value/set"),
            None
        );
    }

    #[test]
    fn unparseable_index_is_a_non_match() {
        assert_eq!(
            spec().match_write(PinKind::Digital, "home/devices/ardulink/Dx1/value/set"),
            None
        );
    }

    #[test]
    fn foreign_topic_is_a_non_match() {
        assert_eq!(
            spec().match_write(PinKind::Digital, "home/devices/ardulink/invalidTopic"),
            None
        );
        assert_eq!(
            spec().match_write(PinKind::Digital, "somewhere/else/D1/value/set"),
            None
        );
    }

    #[test]
    fn read_topic_round_trips() {
        assert_eq!(
            spec().read_topic(PinId::digital(5)),
            "home/devices/ardulink/D5/value/get"
        );
        assert_eq!(
            spec().read_topic(PinId::analog(7)),
            "home/devices/ardulink/A7/value/get"
        );
    }

    #[test]
    fn base_is_normalized() {
        let spec = TopicSpec::new("no/trailing/separator");
        assert_eq!(spec.base(), "no/trailing/separator/");
        assert_eq!(spec.subscription_filter(), "no/trailing/separator/#");
    }

    #[test]
    fn boolean_parse_is_lenient() {
        assert!(parse_lenient_bool("true"));
        assert!(parse_lenient_bool("TRUE"));
        assert!(parse_lenient_bool("tRuE"));

        assert!(!parse_lenient_bool("false"));
        assert!(!parse_lenient_bool("1"));
        assert!(!parse_lenient_bool("yes"));
        assert!(!parse_lenient_bool(""));
        assert!(!parse_lenient_bool("garbage"));
    }
}
