//! Crate-internal helpers.

/// Convenient way to return an error if a condition isn't true.
macro_rules! require {
    ( $cond: expr, $err: expr ) => {
        if !($cond) {
            return Err($err);
        }
    };
}
pub(crate) use require;
