//
// Macros
//
macro_rules! ok_some {
    ($x:expr) => (Ok(Some($x)))
}

macro_rules! check {
    ($check:expr, $err:expr) => (
        if !$check {
            return Err($err);
        }
    )
}
