//! The command-token mini-language.
//!
//! Each token is consumed left to right in a single pass: an optional
//! `temp-` prefix, a command name, then `=`-introduced and `,`-separated
//! numeric fields with strtol-style base detection. Parsing is
//! per-token; the dispatcher applies each token before looking at the
//! next one, so the first invalid token aborts the run with everything
//! before it already sent.

use crate::error::{Error, Result};
use crate::wheel::{Permanence, WheelMode};

/// One fully-parsed CLI token, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Set {
        mode: WheelMode,
        permanence: Permanence,
    },
    QueryMode,
    QueryBattery,
    Reconnect,
    /// Debug: send a caller-supplied report verbatim.
    Raw { report_id: u32, data: Vec<u8> },
    /// Debug: read a report back and hex-dump it.
    QueryReport { report_id: u32, len: usize },
    /// Debug: print incoming events until `timeout_ms` passes without
    /// one (negative blocks indefinitely).
    Dump { timeout_ms: i32 },
    Sleep { seconds: u64 },
}

/// Most values a `raw` token may carry: the report id plus one frame of
/// up to 255 bytes.
const RAW_MAX_VALUES: usize = 256;

/// strtol(s, end, 0): optional sign, then `0x`/`0X` hex, leading `0`
/// octal, decimal otherwise. Returns the value and the unconsumed tail;
/// `None` when no digits were consumed.
fn scan_int(s: &str) -> (Option<i64>, &str) {
    let bytes = s.as_bytes();
    let mut i = 0;
    let mut neg = false;
    if let Some(&sign) = bytes.first() {
        if sign == b'+' || sign == b'-' {
            neg = sign == b'-';
            i = 1;
        }
    }

    let (radix, digits_start) = if bytes.len() > i + 2
        && bytes[i] == b'0'
        && (bytes[i + 1] == b'x' || bytes[i + 1] == b'X')
        && bytes[i + 2].is_ascii_hexdigit()
    {
        (16, i + 2)
    } else if bytes.get(i) == Some(&b'0') {
        (8, i)
    } else {
        (10, i)
    };

    let mut j = digits_start;
    let mut value: i64 = 0;
    while j < bytes.len() {
        let Some(d) = (bytes[j] as char).to_digit(radix) else {
            break;
        };
        value = value.saturating_mul(i64::from(radix)).saturating_add(i64::from(d));
        j += 1;
    }
    if j == digits_start {
        // A bare sign or `0x` prefix consumes nothing.
        return (None, s);
    }
    (Some(if neg { -value } else { value }), &s[j..])
}

/// Parse one delimiter-introduced field. An absent delimiter or absent
/// digits leave the default in place; parsed values are range-checked.
fn one_arg<'a>(s: &'a str, delim: char, default: i64, min: i64, max: i64) -> Result<(i64, &'a str)> {
    if s.is_empty() {
        return Ok((default, s));
    }
    let Some(rest) = s.strip_prefix(delim) else {
        return Err(Error::Argument(format!(
            "bad argument `{s}': `{delim}' expected"
        )));
    };
    match scan_int(rest) {
        (Some(n), tail) => {
            if n < min || n > max {
                let text = &rest[..rest.len() - tail.len()];
                return Err(Error::Argument(format!(
                    "argument `{text}' out of range ({min}-{max})"
                )));
            }
            Ok((n, tail))
        }
        (None, tail) => Ok((default, tail)),
    }
}

/// `=a[,b]` pair; an omitted second field copies the first parsed value
/// before range validation.
fn two_args(s: &str, default: i64, min: i64, max: i64) -> Result<(i64, i64)> {
    let (a, rest) = one_arg(s, '=', default, min, max)?;
    let (b, rest) = one_arg(rest, ',', a, min, max)?;
    if !rest.is_empty() {
        return Err(Error::Argument(format!("malformed argument `{s}'")));
    }
    Ok((a, b))
}

/// `=a[,b...]` list of up to `max_n` fields; returns only the fields
/// that were present.
fn n_args(s: &str, max_n: usize, default: i64, min: i64, max: i64) -> Result<Vec<i64>> {
    let mut out = Vec::new();
    let mut rest = s;
    let mut delim = '=';
    for _ in 0..max_n {
        if rest.is_empty() {
            break;
        }
        let (v, tail) = one_arg(rest, delim, default, min, max)?;
        out.push(v);
        rest = tail;
        delim = ',';
    }
    if !rest.is_empty() {
        return Err(Error::Argument(format!("malformed argument `{s}'")));
    }
    Ok(out)
}

/// Parse one CLI token into an [`Action`].
pub fn parse_token(token: &str) -> Result<Action> {
    let (cmd, permanence) = match token.strip_prefix("temp-") {
        Some(rest) => (rest, Permanence::Temporary),
        None => (token, Permanence::Permanent),
    };

    if cmd == "free" {
        return Ok(Action::Set {
            mode: WheelMode::Free,
            permanence,
        });
    }
    if cmd == "click" {
        return Ok(Action::Set {
            mode: WheelMode::Click,
            permanence,
        });
    }
    if let Some(rest) = cmd.strip_prefix("manual") {
        let (up, down) = two_args(rest, 0, 0, 15)?;
        return Ok(Action::Set {
            mode: WheelMode::Manual {
                up: up as u8,
                down: down as u8,
            },
            permanence,
        });
    }
    if let Some(rest) = cmd.strip_prefix("auto") {
        let (up, down) = two_args(rest, 0, 0, 50)?;
        return Ok(Action::Set {
            mode: WheelMode::Auto {
                up: up as u8,
                down: down as u8,
            },
            permanence,
        });
    }

    // Everything below ignores permanence, so a `temp-` prefix leaves
    // the token unrecognized.
    if permanence == Permanence::Temporary {
        return Err(Error::Argument(format!("unknown option `{token}'")));
    }

    if let Some(rest) = cmd.strip_prefix("soft-free") {
        let (p1, p2) = two_args(rest, 0, 0, 255)?;
        return Ok(Action::Set {
            mode: WheelMode::SoftFree {
                p1: p1 as u8,
                p2: p2 as u8,
            },
            permanence,
        });
    }
    if let Some(rest) = cmd.strip_prefix("soft-click") {
        let (p1, p2) = two_args(rest, 0, 0, 255)?;
        return Ok(Action::Set {
            mode: WheelMode::SoftClick {
                p1: p1 as u8,
                p2: p2 as u8,
            },
            permanence,
        });
    }
    if let Some(rest) = cmd.strip_prefix("reconnect") {
        // Trailing values are validated but unused.
        two_args(rest, 0, 0, 255)?;
        return Ok(Action::Reconnect);
    }
    if cmd == "mode" {
        return Ok(Action::QueryMode);
    }
    if cmd == "battery" {
        return Ok(Action::QueryBattery);
    }

    // Debug commands.
    if let Some(rest) = cmd.strip_prefix("raw") {
        let values = n_args(rest, RAW_MAX_VALUES, 0, 0, 255)?;
        let Some((&report_id, data)) = values.split_first() else {
            return Err(Error::Argument(format!(
                "bad argument `{token}': report id required"
            )));
        };
        return Ok(Action::Raw {
            report_id: report_id as u32,
            data: data.iter().map(|&v| v as u8).collect(),
        });
    }
    if let Some(rest) = cmd.strip_prefix("query") {
        let (id, len) = two_args(rest, -1, 0, 255)?;
        let (report_id, len) = if id == -1 { (0x10, 6) } else { (id, len) };
        return Ok(Action::QueryReport {
            report_id: report_id as u32,
            len: len as usize,
        });
    }
    if let Some(rest) = cmd.strip_prefix("dump") {
        let (secs, _) = two_args(rest, 3, -1, 24 * 60 * 60)?;
        let timeout_ms = if secs > 0 { (secs * 1000) as i32 } else { secs as i32 };
        return Ok(Action::Dump { timeout_ms });
    }
    if let Some(rest) = cmd.strip_prefix("sleep") {
        let (secs, _) = two_args(rest, 1, 0, 255)?;
        return Ok(Action::Sleep {
            seconds: secs as u64,
        });
    }

    Err(Error::Argument(format!("unknown option `{token}'")))
}
