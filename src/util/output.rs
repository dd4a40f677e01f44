#![allow(clippy::print_stdout)]

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/* Action results, collected for `--json` and printed once at exit */
static JSON_OUTPUT: Mutex<Option<Map<String, Value>>> = Mutex::new(None);
static PLAIN_OUTPUT: AtomicBool = AtomicBool::new(true);

/// Human readable output is suppressed when the caller asked for JSON.
pub fn set_plain_output(enabled: bool) {
    PLAIN_OUTPUT.store(enabled, Ordering::Relaxed);
}

pub fn print_output(line: &str) {
    if PLAIN_OUTPUT.load(Ordering::Relaxed) {
        println!("{}", line);
    }
}

pub fn set_json_output(key: &str, value: impl Into<Value>) {
    let mut output = match JSON_OUTPUT.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    output
        .get_or_insert_with(Map::new)
        .insert(key.to_string(), value.into());
}

#[macro_export]
macro_rules! outln {
    ( $fmt:expr $(, $args:expr)*) => {
        $crate::util::print_output(&format!($fmt $(, $args)*))
    };
}

pub fn print_json_output() -> Result<()> {
    let map = match JSON_OUTPUT.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    }
    .unwrap_or_default();

    println!(
        "{}",
        serde_json::to_string_pretty(&Value::Object(map))
            .context("Error serializing JSON")?
    );
    Ok(())
}
