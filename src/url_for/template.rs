//! Path templates: literal text interleaved with `{name}`, `{name...}` and
//! the end-of-path marker `{$}`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use super::UrlParams;
use crate::error::{Error, Result};

/// One token of a path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Literal text, or the parameter name with any `...` suffix trimmed.
    pub name: String,
    pub param: bool,
    pub value: Option<String>,
}

impl Segment {
    fn literal(text: &str) -> Self {
        Self {
            name: text.to_string(),
            param: false,
            value: None,
        }
    }

    fn param(name: &str) -> Self {
        Self {
            name: name.to_string(),
            param: true,
            value: None,
        }
    }
}

/// Split `pattern` into literal and parameter segments.
///
/// `{$}` is kept as a literal segment so callers can strip it afterwards.
pub fn parse_segments(pattern: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut rest = pattern;
    while !rest.is_empty() {
        let Some(start) = rest.find('{') else {
            segments.push(Segment::literal(rest));
            break;
        };
        if start > 0 {
            segments.push(Segment::literal(&rest[..start]));
        }
        rest = &rest[start + 1..];
        let Some(end) = rest.find('}') else {
            return Err(Error::Parse(format!("pattern {}: unmatched {{", pattern)));
        };
        let name = &rest[..end];
        rest = &rest[end + 1..];
        if name == "$" {
            segments.push(Segment::literal("{$}"));
            continue;
        }
        segments.push(Segment::param(name.strip_suffix("...").unwrap_or(name)));
    }
    Ok(segments)
}

/// An argument to [`format_path_segments`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlArg {
    /// A string argument. May also act as a parameter name in name/value
    /// pair lists.
    Literal(String),
    /// Any other value, already formatted.
    Value(String),
    /// Named values, one per parameter.
    Map(BTreeMap<String, String>),
}

impl UrlArg {
    fn text(&self) -> Option<&str> {
        match self {
            UrlArg::Literal(s) | UrlArg::Value(s) => Some(s),
            UrlArg::Map(_) => None,
        }
    }
}

impl fmt::Display for UrlArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlArg::Literal(s) | UrlArg::Value(s) => f.write_str(s),
            UrlArg::Map(map) => {
                f.write_str("map[")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}:{}", k, v)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for UrlArg {
    fn from(s: &str) -> Self {
        UrlArg::Literal(s.to_string())
    }
}

impl From<String> for UrlArg {
    fn from(s: String) -> Self {
        UrlArg::Literal(s)
    }
}

impl From<&String> for UrlArg {
    fn from(s: &String) -> Self {
        UrlArg::Literal(s.clone())
    }
}

impl From<BTreeMap<String, String>> for UrlArg {
    fn from(map: BTreeMap<String, String>) -> Self {
        UrlArg::Map(map)
    }
}

impl From<HashMap<String, String>> for UrlArg {
    fn from(map: HashMap<String, String>) -> Self {
        UrlArg::Map(map.into_iter().collect())
    }
}

macro_rules! display_args {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for UrlArg {
                fn from(v: $ty) -> Self {
                    UrlArg::Value(v.to_string())
                }
            }
        )*
    };
}

display_args!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, bool, char);

fn show_args(args: &[UrlArg]) -> String {
    let parts: Vec<String> = args.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(" "))
}

/// Fill the parameters of `pattern`.
///
/// Ambient `params` pre-fill parameters by name. Explicit `args` are then
/// applied as the first of these that fits:
///
/// 1. a leading map, which must leave no parameter unfilled (a map in any
///    other position is an error);
/// 2. exactly one value per parameter, overriding ambient values;
/// 3. an even-length list of literal names and values, when at least one
///    name is a parameter of the pattern;
/// 4. values for the still-unfilled parameters, in order.
///
/// A pattern without parameters is returned unchanged when no args are given.
pub fn format_path_segments(
    pattern: &str,
    params: Option<&UrlParams>,
    args: &[UrlArg],
) -> Result<String> {
    let mut segments = parse_segments(pattern)?;
    let indices: Vec<usize> = segments
        .iter()
        .enumerate()
        .filter(|(_, s)| s.param)
        .map(|(i, _)| i)
        .collect();
    if args.is_empty() && indices.is_empty() {
        return Ok(pattern.to_string());
    }

    if let Some(params) = params {
        for &idx in &indices {
            if let Some(value) = params.get(&segments[idx].name) {
                segments[idx].value = Some(value.to_string());
            }
        }
    }
    let unfilled = |segments: &[Segment]| -> Option<String> {
        indices
            .iter()
            .map(|&idx| &segments[idx])
            .find(|s| s.value.is_none())
            .map(|s| s.name.clone())
    };

    if args.is_empty() {
        if unfilled(&segments).is_some() {
            return Err(Error::NotFound(format!(
                "pattern {}: no arguments provided",
                pattern
            )));
        }
        return Ok(join(&segments));
    }

    if let UrlArg::Map(map) = &args[0] {
        for &idx in &indices {
            if let Some(value) = map.get(&segments[idx].name) {
                segments[idx].value = Some(value.clone());
            }
        }
        if let Some(name) = unfilled(&segments) {
            return Err(Error::NotFound(format!(
                "pattern {}: argument {} not found in provided args: {}",
                pattern,
                name,
                show_args(args)
            )));
        }
        return Ok(join(&segments));
    }
    if args.iter().any(|arg| matches!(arg, UrlArg::Map(_))) {
        return Err(Error::Parse(format!(
            "pattern {}: a map argument must be the only or first argument, got {}",
            pattern,
            show_args(args)
        )));
    }

    if args.len() == indices.len() {
        for (arg, &idx) in args.iter().zip(&indices) {
            segments[idx].value = arg.text().map(str::to_string);
        }
        return Ok(join(&segments));
    }

    if args.len() >= 2 && args.len() % 2 == 0 {
        if let Some(pairs) = as_pairs(&segments, &indices, args) {
            for &idx in &indices {
                match pairs.get(segments[idx].name.as_str()) {
                    Some(value) => segments[idx].value = Some((*value).to_string()),
                    None if segments[idx].value.is_none() => {
                        return Err(Error::NotFound(format!(
                            "pattern {}: argument {} not found in provided args: {}",
                            pattern,
                            segments[idx].name,
                            show_args(args)
                        )));
                    }
                    None => {}
                }
            }
            return Ok(join(&segments));
        }
    }

    let missing = indices
        .iter()
        .filter(|&&idx| segments[idx].value.is_none())
        .count();
    if args.len() < missing {
        return Err(Error::NotEnoughArguments {
            pattern: pattern.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
        });
    }
    let mut positional = args.iter();
    for &idx in &indices {
        if segments[idx].value.is_none() {
            if let Some(arg) = positional.next() {
                segments[idx].value = arg.text().map(str::to_string);
            }
        }
    }
    Ok(join(&segments))
}

/// Name/value pairs, when every even-indexed arg is a literal and at least
/// one of them names a parameter.
fn as_pairs<'a>(
    segments: &[Segment],
    indices: &[usize],
    args: &'a [UrlArg],
) -> Option<HashMap<&'a str, &'a str>> {
    let names: HashSet<&str> = indices.iter().map(|&i| segments[i].name.as_str()).collect();
    let mut pairs = HashMap::new();
    let mut matched = false;
    for pair in args.chunks(2) {
        let UrlArg::Literal(key) = &pair[0] else {
            return None;
        };
        matched |= names.contains(key.as_str());
        pairs.insert(key.as_str(), pair[1].text().unwrap_or_default());
    }
    matched.then_some(pairs)
}

fn join(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.value.as_deref().unwrap_or(&s.name))
        .collect()
}
