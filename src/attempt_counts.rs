use regex::Regex;
use std::sync::OnceLock;

/// Success/failure tallies for the two retrieval subsystems, recovered from
/// the bot's `RecordAttemptCount` text (`"[s1/f1],[s2/f2]"`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AttemptCounts {
    pub careport_success: u32,
    pub careport_failure: u32,
    pub sunrise_success: u32,
    pub sunrise_failure: u32,
}

impl AttemptCounts {
    pub fn as_tuple(self) -> (u32, u32, u32, u32) {
        (
            self.careport_success,
            self.careport_failure,
            self.sunrise_success,
            self.sunrise_failure,
        )
    }
}

fn careport_success_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[(\d+)/\d+\]").expect("invalid careport success regex"))
}

fn careport_failure_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\d+/(\d+)\]").expect("invalid careport failure regex"))
}

fn sunrise_success_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\],\[(\d+)/\d+\]").expect("invalid sunrise success regex"))
}

fn sunrise_failure_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\],\[\d+/(\d+)\]").expect("invalid sunrise failure regex"))
}

fn first_capture(re: &Regex, text: &str) -> u32 {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .unwrap_or(0)
}

/// Each counter is extracted on its own; anything missing or out of range is 0.
pub fn parse_attempts(text: &str) -> AttemptCounts {
    AttemptCounts {
        careport_success: first_capture(careport_success_re(), text),
        careport_failure: first_capture(careport_failure_re(), text),
        sunrise_success: first_capture(sunrise_success_re(), text),
        sunrise_failure: first_capture(sunrise_failure_re(), text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_and_paired_attempt_blocks() {
        assert_eq!(parse_attempts("[3/1]").as_tuple(), (3, 1, 0, 0));
        assert_eq!(parse_attempts("[3/1],[2/0]").as_tuple(), (3, 1, 2, 0));
        assert_eq!(parse_attempts("Attempts: [12/4],[0/7] done").as_tuple(), (12, 4, 0, 7));
    }

    #[test]
    fn missing_or_malformed_text_yields_zeroes() {
        assert_eq!(parse_attempts("").as_tuple(), (0, 0, 0, 0));
        assert_eq!(parse_attempts("garbage").as_tuple(), (0, 0, 0, 0));
        assert_eq!(parse_attempts("[a/b]").as_tuple(), (0, 0, 0, 0));
        assert_eq!(parse_attempts("[99999999999/1]").as_tuple(), (0, 1, 0, 0));
    }

    #[test]
    fn second_block_only_counts_when_comma_joined() {
        assert_eq!(parse_attempts("[3/1] [2/0]").as_tuple(), (3, 1, 0, 0));
        assert_eq!(parse_attempts("[3/1];[2/0]").as_tuple(), (3, 1, 0, 0));
        assert_eq!(parse_attempts("[3/1], [2/0]").as_tuple(), (3, 1, 0, 0));
    }
}
