#[cfg(not(test))]
macro_rules! info {
    ($($arg:tt)*) => {
        log::info!($($arg)*)
    };
}

#[cfg(test)]
macro_rules! info {
    ($($arg:tt)*) => {
        eprintln!($($arg)*)
    };
}

#[cfg(not(test))]
macro_rules! warn {
    ($($arg:tt)*) => {
        log::warn!($($arg)*)
    };
}

#[cfg(test)]
macro_rules! warn {
    ($($arg:tt)*) => {
        eprintln!($($arg)*)
    };
}
