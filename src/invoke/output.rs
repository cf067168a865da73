use std::collections::{BTreeMap, HashMap};

use super::core::Arg;
use super::params::Props;

/// The normalised result of a method call: zero or more values plus the
/// trailing error, if the method reported one.
#[derive(Debug, Default)]
pub struct Returned {
    values: Vec<Arg>,
    error: Option<anyhow::Error>,
}

impl Returned {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    pub fn value<T: 'static>(value: T) -> Self {
        Self {
            values: vec![Arg::new(value)],
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: anyhow::Error) -> Self {
        Self {
            values: Vec::new(),
            error: Some(error),
        }
    }

    #[must_use]
    pub fn values(&self) -> &[Arg] {
        &self.values
    }

    #[must_use]
    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }

    /// Split off the trailing error.
    pub fn strip_error(self) -> Result<Vec<Arg>, anyhow::Error> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.values),
        }
    }
}

/// Conversion of a method's return value into [`Returned`].
///
/// `Result<T, E>` marks the method fallible: `Err` becomes the trailing
/// error and `Ok(T)` is converted further. Wrap arbitrary values in
/// [`Props`] to return them as a single value; tuples return one value per
/// element.
pub trait IntoOutput: 'static {
    const FALLIBLE: bool = false;

    fn into_returned(self) -> Returned;
}

impl IntoOutput for () {
    fn into_returned(self) -> Returned {
        Returned::none()
    }
}

impl<T: IntoOutput, E: Into<anyhow::Error> + 'static> IntoOutput for Result<T, E> {
    const FALLIBLE: bool = true;

    fn into_returned(self) -> Returned {
        match self {
            Ok(value) => value.into_returned(),
            Err(error) => Returned::failed(error.into()),
        }
    }
}

impl<T: 'static> IntoOutput for Props<T> {
    fn into_returned(self) -> Returned {
        Returned::value(self.0)
    }
}

macro_rules! single_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoOutput for $ty {
                fn into_returned(self) -> Returned {
                    Returned::value(self)
                }
            }
        )*
    };
}

single_value!(
    String,
    &'static str,
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    isize,
    u8,
    u16,
    u32,
    u64,
    usize,
    f32,
    f64,
);

impl<T: 'static> IntoOutput for Vec<T> {
    fn into_returned(self) -> Returned {
        Returned::value(self)
    }
}

impl<T: 'static> IntoOutput for Option<T> {
    fn into_returned(self) -> Returned {
        Returned::value(self)
    }
}

impl<K: 'static, V: 'static> IntoOutput for HashMap<K, V> {
    fn into_returned(self) -> Returned {
        Returned::value(self)
    }
}

impl<K: 'static, V: 'static> IntoOutput for BTreeMap<K, V> {
    fn into_returned(self) -> Returned {
        Returned::value(self)
    }
}

macro_rules! tuple_values {
    ($($ty:ident),+) => {
        impl<$($ty: 'static),+> IntoOutput for ($($ty,)+) {
            #[allow(non_snake_case)]
            fn into_returned(self) -> Returned {
                let ($($ty,)+) = self;
                Returned {
                    values: vec![$(Arg::new($ty)),+],
                    error: None,
                }
            }
        }
    };
}

tuple_values!(A, B);
tuple_values!(A, B, C);
tuple_values!(A, B, C, D);
