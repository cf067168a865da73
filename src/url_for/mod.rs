//! # Reverse URL lookup
//!
//! Maps a page type (or a node predicate) back to its full route and fills
//! the route's parameters.
//!
//! ```rust,ignore
//! let href = url_for(&req, UrlPart::page::<Post>(), &url_args![post.id])?;
//! let search = url_for(&req, [UrlPart::page::<Search>(), "?q={q}".into()], &url_args!["q" => term])?;
//! ```

mod core;
pub mod template;

use std::collections::BTreeMap;

pub use self::core::{url_for, UrlPart, UrlPattern};
pub use self::template::{format_path_segments, parse_segments, Segment, UrlArg};

/// Path parameter values of the request being served, by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParams(BTreeMap<String, String>);

impl UrlParams {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for UrlParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        UrlParams(iter.into_iter().collect())
    }
}

/// Build a `Vec<UrlArg>`: positional values, or `name => value` pairs
/// collected into a single map argument.
#[macro_export]
macro_rules! url_args {
    () => {
        ::std::vec::Vec::<$crate::UrlArg>::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut map = ::std::collections::BTreeMap::<::std::string::String, ::std::string::String>::new();
        $(map.insert(::std::string::ToString::to_string(&$name), ::std::string::ToString::to_string(&$value));)+
        ::std::vec![$crate::UrlArg::Map(map)]
    }};
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::UrlArg::from($arg)),+]
    };
}
