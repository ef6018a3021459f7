//! Raw bridge calls against a fresh host runtime.
//!
//! Prints the call result (or the coded error) as JSON, mirroring what the
//! cross-language channel would relay to application logic.

use std::error::Error;

use daybreak_core::bridge;
use daybreak_core::platform::host::bring_up;
use daybreak_core::platform::Capabilities;
use daybreak_core::Config;
use serde_json::{json, Value};

pub fn run(method: &str, args: &str) -> Result<(), Box<dyn Error>> {
    let args: Value = serde_json::from_str(args)?;
    let rt = bring_up(&Config::load_or_default(), Capabilities::MODERN, true);

    let output = match bridge::handle_call(&rt.scheduler, method, &args) {
        Ok(value) => json!({ "result": value }),
        Err(err) => json!({ "error": { "code": err.code, "message": err.message } }),
    };
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}
