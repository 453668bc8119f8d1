//! Time-offset commands written in an event description.
//!
//! One command per line. A line may start with a prefix that moves its
//! execution time away from the event start:
//!
//! ```text
//! echo 'Wake up!'                 at start
//! +10: echo 'You are late'        10 minutes after start
//! -60: start_heating.py           an hour before start
//! end: Turn off lights            at end
//! end -10: Dim lights             10 minutes before end
//! ```

use chrono::{Duration, NaiveDateTime};
use tracing::debug;

use crate::action::DerivedAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    Start,
    End,
}

/// A recognized `[end][ ][+-N]:` prefix and the text that follows it.
#[derive(Debug, PartialEq, Eq)]
struct Prefix<'a> {
    anchor: Anchor,
    offset_minutes: i64,
    command: &'a str,
}

fn split_prefix(line: &str) -> Option<Prefix<'_>> {
    let mut rest = line;

    let anchor = match rest.strip_prefix("end") {
        Some(after) => {
            rest = after;
            Anchor::End
        }
        None => Anchor::Start,
    };
    rest = rest.strip_prefix(' ').unwrap_or(rest);

    let mut offset_minutes = 0;
    if let Some(sign) = rest.chars().next().filter(|c| *c == '+' || *c == '-') {
        let unsigned = &rest[1..];
        let digits = unsigned
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(unsigned.len());
        if digits == 0 {
            return None;
        }
        let value: i64 = unsigned[..digits].parse().ok()?;
        offset_minutes = if sign == '-' { -value } else { value };
        rest = &unsigned[digits..];
    }

    let command = rest.strip_prefix(':')?;
    Some(Prefix {
        anchor,
        offset_minutes,
        command,
    })
}

/// Resolve one line to its execution time and command text.
fn resolve_line(
    line: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> (NaiveDateTime, &str) {
    let resolved = split_prefix(line).and_then(|prefix| {
        let base = match prefix.anchor {
            Anchor::Start => start,
            Anchor::End => end,
        };
        let at = base.checked_add_signed(Duration::try_minutes(prefix.offset_minutes)?)?;
        Some((at, prefix.command))
    });

    let (at, command) = resolved.unwrap_or((start, line));
    (at, command.trim())
}

/// Parse a description into the commands still due at or after `now`.
pub fn parse_commands(
    description: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
    now: NaiveDateTime,
) -> Vec<DerivedAction> {
    let mut actions = Vec::new();

    for line in description.lines() {
        let (at, command) = resolve_line(line.trim(), start, end);

        if command.is_empty() {
            continue;
        }
        if at < now {
            debug!(command, %at, "Ignoring command that was scheduled for the past");
            continue;
        }

        actions.push(DerivedAction::new(command, at));
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_plus_offset_is_relative_to_start() {
        let start = at(3011, 6, 19, 8, 30);
        let end = at(3011, 6, 19, 9, 0);

        let actions = parse_commands("+10: cmd", start, end, at(2026, 1, 1, 0, 0));

        assert_eq!(actions, vec![DerivedAction::new("cmd", at(3011, 6, 19, 8, 40))]);
    }

    #[test]
    fn test_end_prefixes_anchor_to_end() {
        let start = at(3011, 6, 19, 18, 30);
        let end = at(3011, 6, 19, 23, 0);

        let actions = parse_commands(
            "Turn on lights\nend -10: Dim lights\nend: Turn off lights\nend+5: Lock door",
            start,
            end,
            at(2026, 1, 1, 0, 0),
        );

        assert_eq!(
            actions,
            vec![
                DerivedAction::new("Turn on lights", at(3011, 6, 19, 18, 30)),
                DerivedAction::new("Dim lights", at(3011, 6, 19, 22, 50)),
                DerivedAction::new("Turn off lights", at(3011, 6, 19, 23, 0)),
                DerivedAction::new("Lock door", at(3011, 6, 19, 23, 5)),
            ]
        );
    }

    #[test]
    fn test_line_without_prefix_runs_at_start() {
        let start = at(3011, 6, 19, 8, 30);
        let end = at(3011, 6, 19, 9, 0);

        let actions = parse_commands(
            "echo 'Wake up!'\n+10: echo 'Wake up, you are 10 minutes late!'",
            start,
            end,
            at(2026, 1, 1, 0, 0),
        );

        assert_eq!(
            actions,
            vec![
                DerivedAction::new("echo 'Wake up!'", start),
                DerivedAction::new(
                    "echo 'Wake up, you are 10 minutes late!'",
                    at(3011, 6, 19, 8, 40)
                ),
            ]
        );
    }

    #[test]
    fn test_negative_offset_before_start() {
        let start = at(2113, 12, 23, 1, 0);
        let end = at(2113, 12, 23, 2, 0);

        let actions = parse_commands("-60: start_heating.py", start, end, at(2026, 1, 1, 0, 0));

        assert_eq!(
            actions,
            vec![DerivedAction::new("start_heating.py", at(2113, 12, 23, 0, 0))]
        );
    }

    #[test]
    fn test_malformed_offset_keeps_whole_line() {
        let start = at(3011, 6, 19, 8, 30);
        let end = at(3011, 6, 19, 9, 0);

        let actions = parse_commands("+ten: cmd\nendless loop", start, end, at(2026, 1, 1, 0, 0));

        assert_eq!(
            actions,
            vec![
                DerivedAction::new("+ten: cmd", start),
                DerivedAction::new("endless loop", start),
            ]
        );
    }

    #[test]
    fn test_blank_lines_and_empty_commands_are_dropped() {
        let start = at(3011, 6, 19, 8, 30);
        let end = at(3011, 6, 19, 9, 0);

        let actions = parse_commands("\n   \nend:\n+5:   \nreal", start, end, at(2026, 1, 1, 0, 0));

        assert_eq!(actions, vec![DerivedAction::new("real", start)]);
    }

    #[test]
    fn test_commands_in_the_past_are_dropped() {
        let start = at(2026, 3, 1, 8, 0);
        let end = at(2026, 3, 1, 9, 0);
        let now = at(2026, 3, 1, 8, 30);

        let actions = parse_commands("on\n+30: halfway\n+45: later\nend: off", start, end, now);

        assert_eq!(
            actions,
            vec![
                DerivedAction::new("halfway", now),
                DerivedAction::new("later", at(2026, 3, 1, 8, 45)),
                DerivedAction::new("off", end),
            ]
        );
    }

    #[test]
    fn test_split_prefix_grammar() {
        assert_eq!(
            split_prefix("end -10: x"),
            Some(Prefix {
                anchor: Anchor::End,
                offset_minutes: -10,
                command: " x"
            })
        );
        assert_eq!(split_prefix("echo hi"), None);
        assert_eq!(split_prefix("+99999999999999999999: overflow"), None);
    }
}
