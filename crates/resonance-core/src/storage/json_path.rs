//! Dot-separated key access over serde_json values.
//!
//! Shared by the TOML configuration and the persisted user settings so the
//! CLI can `get`/`set` either with keys like `timer.drift_correction_limit_secs`.

/// Look up `a.b.c` inside `root`.
pub fn get_json_value_by_path<'a>(
    root: &'a serde_json::Value,
    key: &str,
) -> Option<&'a serde_json::Value> {
    if key.is_empty() {
        return None;
    }

    let mut current = root;
    for part in key.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

/// Replace an existing leaf, parsing `value` to the leaf's current JSON type.
///
/// Unknown keys are rejected; new keys are never created.
pub fn set_json_value_by_path(
    root: &mut serde_json::Value,
    key: &str,
    value: &str,
) -> Result<(), String> {
    let mut parts = key.split('.').peekable();
    if key.is_empty() {
        return Err("key is empty".into());
    }

    let mut current = root;
    while let Some(part) = parts.next() {
        let is_leaf = parts.peek().is_none();
        if is_leaf {
            let obj = current
                .as_object_mut()
                .ok_or_else(|| format!("unknown key: {key}"))?;
            let existing = obj
                .get(part)
                .ok_or_else(|| format!("unknown key: {key}"))?;

            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|_| format!("cannot parse '{value}' as bool"))?,
                ),
                serde_json::Value::Number(_) => {
                    if let Ok(n) = value.parse::<u64>() {
                        serde_json::Value::Number(n.into())
                    } else if let Ok(n) = value.parse::<f64>() {
                        serde_json::Number::from_f64(n)
                            .map(serde_json::Value::Number)
                            .ok_or_else(|| format!("cannot parse '{value}' as number"))?
                    } else {
                        return Err(format!("cannot parse '{value}' as number"));
                    }
                }
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value).map_err(|e| e.to_string())?
                }
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        current = current
            .get_mut(part)
            .ok_or_else(|| format!("unknown key: {key}"))?;
    }

    Err(format!("unknown key: {key}"))
}
