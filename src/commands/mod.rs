pub mod channel;
pub mod originate;

pub use channel::{
    UuidAnswer, UuidBridge, UuidBroadcast, UuidDeflect, UuidExists, UuidGetVar, UuidHold, UuidKill,
    UuidRecord, UuidSendDtmf, UuidSetVar, UuidTransfer,
};
pub use originate::{
    Application, ApplicationList, DialplanType, Endpoint, Originate, OriginateError, Variables,
    VariablesType,
};

/// Quote-aware tokenizer for originate command strings.
///
/// Splits `line` on `split_at` (default: space), respecting single-quote
/// pairing to avoid splitting inside quoted values. Backslash-escaped quotes
/// are not treated as quote boundaries.
///
/// Ported from Python `originate_split()`.
pub fn originate_split(line: &str, split_at: char) -> Result<Vec<String>, OriginateError> {
    let mut tokens = Vec::new();
    let mut token = String::new();
    let mut in_quote = false;
    let chars: Vec<char> = line
        .chars()
        .collect();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];

        if ch == split_at
            && !in_quote
            && !token
                .trim()
                .is_empty()
        {
            tokens.push(
                token
                    .trim()
                    .to_string(),
            );
            token.clear();
            i += 1;
            continue;
        }

        if ch == '\'' && !(i > 0 && chars[i - 1] == '\\') {
            in_quote = !in_quote;
        }

        token.push(ch);
        i += 1;
    }

    if in_quote {
        return Err(OriginateError::UnclosedQuote(token));
    }

    let token = token
        .trim()
        .to_string();
    if !token.is_empty() {
        tokens.push(token);
    }

    Ok(tokens)
}

/// Parse an application list string into individual applications.
///
/// Handles three formats:
/// - Bare extension: `"123"` → single app with name=extension, no args
/// - XML format: `"&app(args)"` → single app
/// - Inline format: `"app1:args1,app2:args2"` → multiple apps
pub fn parse_application_list(
    s: &str,
    dialplan: Option<&DialplanType>,
) -> Result<ApplicationList, OriginateError> {
    if matches!(dialplan, Some(DialplanType::Inline)) {
        let mut apps = Vec::new();
        for part in originate_split(s, ',')? {
            let (name, args) = part
                .split_once(':')
                .ok_or_else(|| {
                    OriginateError::ParseError(format!("invalid inline application: {}", part))
                })?;
            apps.push(Application::new(name, Some(args)));
        }
        Ok(ApplicationList(apps))
    } else if let Some(rest) = s.strip_prefix('&') {
        let rest = rest
            .strip_suffix(')')
            .ok_or_else(|| OriginateError::ParseError("missing closing paren".into()))?;
        let (name, args) = rest
            .split_once('(')
            .ok_or_else(|| OriginateError::ParseError("missing opening paren".into()))?;
        let args = if args.is_empty() { None } else { Some(args) };
        Ok(ApplicationList(vec![Application::new(name, args)]))
    } else {
        Ok(ApplicationList(vec![Application::new(s, None::<&str>)]))
    }
}
