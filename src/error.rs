use snafu::Snafu;

/// The public Error type for this crate.
#[derive(Debug, Snafu)]
pub struct Error(LibError);

impl Error {
    /// True when the failure was "insufficient input" — the caller may want
    /// to treat this differently from a structurally malformed file.
    pub fn is_insufficient_input(&self) -> bool {
        matches!(self.0, LibError::InsufficientInput { .. })
    }
}

/// The public Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The internal Result type for this crate.
pub(crate) type LibResult<T> = std::result::Result<T, LibError>;

/// The internal Error type for this crate. Mirrors the three fatal error
/// kinds named by the spec's error-handling design: insufficient input,
/// malformed structure, and unsupported-but-recognized features. Tolerable
/// anomalies never become this type; they are logged in place.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[snafu(context(suffix(false)))]
pub(crate) enum LibError {
    #[snafu(display("{}: insufficient input: {}", site, description))]
    InsufficientInput { site: String, description: String },

    #[snafu(display("{}: malformed structure: {}", site, description))]
    Malformed { site: String, description: String },

    #[snafu(display("{}: unsupported feature: {}", site, description))]
    Unsupported { site: String, description: String },

    #[snafu(display("{}: {}", site, source))]
    Cursor {
        site: String,
        source: crate::byte_iter::ByteError,
    },

    #[snafu(display("{}: inflate failed: {}", site, source))]
    Inflate {
        site: String,
        source: std::io::Error,
    },
}

macro_rules! site {
    () => {
        format!("{}:{}", file!(), line!())
    };
}

macro_rules! cursor_err {
    () => {
        crate::error::Cursor { site: site!() }
    };
}

macro_rules! insufficient_input {
    ($msg:expr) => {
        return Err(crate::error::InsufficientInput {
            site: site!(),
            description: $msg,
        }
        .build())
    };
    ($fmt:expr, $($arg:expr),+) => {
        return Err(crate::error::InsufficientInput {
            site: site!(),
            description: format!($fmt, $($arg),+),
        }
        .build())
    };
}

macro_rules! malformed {
    ($msg:expr) => {
        return Err(crate::error::Malformed {
            site: site!(),
            description: $msg,
        }
        .build())
    };
    ($fmt:expr, $($arg:expr),+) => {
        return Err(crate::error::Malformed {
            site: site!(),
            description: format!($fmt, $($arg),+),
        }
        .build())
    };
}

macro_rules! unsupported {
    ($msg:expr) => {
        return Err(crate::error::Unsupported {
            site: site!(),
            description: $msg,
        }
        .build())
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_format() {
        let line = line!() + 1;
        let site = site!();
        assert!(site.contains("error.rs"));
        assert!(site.contains(format!("{}", line).as_str()));
    }

    #[test]
    fn malformed_macro_message() {
        fn foo() -> LibResult<u64> {
            malformed!("bad track count: {}", 0);
        }
        let err = foo().unwrap_err();
        let message = format!("{}", Error(err));
        assert!(message.contains("bad track count: 0"));
    }

    #[test]
    fn insufficient_input_macro() {
        fn foo() -> LibResult<u64> {
            insufficient_input!("need 18 bytes for SMF header");
        }
        let err = Error(foo().unwrap_err());
        assert!(err.is_insufficient_input());
    }
}
