//! Splits a dotted logical name (`package.symbol`) into its two halves.

use crate::error::{Error, Result};

/// A parsed logical name: a package half and a symbol half, both borrowed
/// from the original string. No allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedName<'a> {
    /// The package portion, e.g. `"foo.bar"` in `"foo.bar.baz"`.
    pub package: &'a str,
    /// The symbol portion, e.g. `"baz"` in `"foo.bar.baz"`.
    pub symbol: &'a str,
}

/// Splits `name` at its last `.`. If there is no `.`, `package` and `symbol`
/// both equal the whole input. Fails with [`Error::BadName`] on an empty
/// string.
pub fn parse(name: &str) -> Result<ParsedName<'_>> {
    if name.is_empty() {
        return Err(Error::bad_name(name));
    }
    match name.rfind('.') {
        Some(k) => Ok(ParsedName {
            package: &name[..k],
            symbol: &name[k + 1..],
        }),
        None => Ok(ParsedName {
            package: name,
            symbol: name,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_last_dot() {
        let parsed = parse("foo.bar.baz").unwrap();
        assert_eq!(parsed.package, "foo.bar");
        assert_eq!(parsed.symbol, "baz");
    }

    #[test]
    fn no_dot_duplicates_whole_string() {
        let parsed = parse("standalone").unwrap();
        assert_eq!(parsed.package, "standalone");
        assert_eq!(parsed.symbol, "standalone");
    }

    #[test]
    fn empty_name_is_bad() {
        assert!(matches!(parse(""), Err(Error::BadName { .. })));
    }

    #[test]
    fn trailing_dot_yields_empty_symbol() {
        let parsed = parse("m.").unwrap();
        assert_eq!(parsed.package, "m");
        assert_eq!(parsed.symbol, "");
    }
}
