//! Fuzz target for PostgreSQL connection string parsing.
//!
//! Feeds both free-form input and generated keyword/value strings to
//! `PgConfig::parse`, which must return errors rather than panic.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_connection_string
//! ```

#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use polysql_postgres::PgConfig;

/// A generated `key=value` pair.
#[derive(Debug, Arbitrary)]
struct FuzzPair {
    key: FuzzKey,
    value: String,
    quoted: bool,
}

#[derive(Debug, Arbitrary)]
enum FuzzKey {
    Host,
    Port,
    User,
    Password,
    Dbname,
    ConnectTimeout,
    Sslmode,
    ApplicationName,
    Other(String),
}

impl FuzzKey {
    fn as_str(&self) -> &str {
        match self {
            Self::Host => "host",
            Self::Port => "port",
            Self::User => "user",
            Self::Password => "password",
            Self::Dbname => "dbname",
            Self::ConnectTimeout => "connect_timeout",
            Self::Sslmode => "sslmode",
            Self::ApplicationName => "application_name",
            Self::Other(key) => key,
        }
    }
}

fn render(pairs: &[FuzzPair]) -> String {
    pairs
        .iter()
        .map(|pair| {
            if pair.quoted {
                let value = pair.value.replace('\\', "\\\\").replace('\'', "\\'");
                format!("{}='{}'", pair.key.as_str(), value)
            } else {
                format!("{}={}", pair.key.as_str(), pair.value)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let _ = PgConfig::parse(input);
    }

    let mut u = Unstructured::new(data);
    if let Ok(pairs) = Vec::<FuzzPair>::arbitrary(&mut u) {
        if let Ok(config) = PgConfig::parse(&render(&pairs)) {
            let _ = config.validate();
        }
    }
});
