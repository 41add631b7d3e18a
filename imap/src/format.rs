use crate::ImapError;

pub(crate) fn quote_astring(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 2);
    out.push('"');
    for ch in input.chars() {
        match ch {
            '"' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

/// Quoted strings cannot carry line breaks; those would need a literal.
pub(crate) fn validate_str(input: &str) -> Result<&str, ImapError> {
    if input.contains(['\r', '\n']) {
        return Err(ImapError::Validate(
            "value contains a line break".to_string(),
        ));
    }
    Ok(input)
}
