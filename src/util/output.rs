#![allow(clippy::print_stdout)]

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use std::sync::Mutex;

static JSON_OUTPUT: LazyLock<Mutex<Map<String, Value>>> =
    LazyLock::new(|| Mutex::new(Map::new()));
static SHOULD_PRINT_OUTPUT: Mutex<bool> = Mutex::new(true);

/// Plain output is suppressed when the run reports as JSON.
pub fn set_should_print_output(should_print: bool) {
    *SHOULD_PRINT_OUTPUT
        .lock()
        .expect("Failed to lock SHOULD_PRINT_OUTPUT") = should_print;
}

pub fn print_output(printed_output: &str) {
    if *SHOULD_PRINT_OUTPUT
        .lock()
        .expect("Failed to lock SHOULD_PRINT_OUTPUT")
    {
        println!("{}", printed_output);
    }
}

pub fn set_json_output<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<()> {
    let value = serde_json::to_value(value)
        .context(format!("Error serializing {}", key))?;
    JSON_OUTPUT
        .lock()
        .expect("Failed to lock JSON_OUTPUT")
        .insert(key.to_string(), value);
    Ok(())
}

/// Everything recorded so far, leaving the record empty.
pub fn take_json_output() -> Value {
    let map = std::mem::take(
        &mut *JSON_OUTPUT.lock().expect("Failed to lock JSON_OUTPUT"),
    );
    Value::Object(map)
}

#[macro_export]
macro_rules! outln {
    ( $fmt:expr $(, $args:expr)*) => {
        $crate::util::print_output(&format!($fmt $(, $args)*))
    };
}

pub fn print_json_output() -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&take_json_output())
            .context("Error serializing JSON")?
    );
    Ok(())
}
