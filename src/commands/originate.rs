use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialplanType {
    Inline,
    Xml,
}

impl fmt::Display for DialplanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialplanType::Inline => write!(f, "inline"),
            DialplanType::Xml => write!(f, "XML"),
        }
    }
}

impl FromStr for DialplanType {
    type Err = OriginateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inline" => Ok(DialplanType::Inline),
            "XML" => Ok(DialplanType::Xml),
            other => Err(OriginateError::ParseError(format!(
                "unknown dialplan type: {}",
                other
            ))),
        }
    }
}

/// Split `s` on `delim`, treating a backslash as escaping the following
/// character (so an escaped delimiter does not split).
fn split_unescaped(s: &str, delim: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = s
        .chars()
        .peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                current.push(c);
                current.push(next);
                continue;
            }
        }
        if c == delim {
            parts.push(current.clone());
            current.clear();
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

/// Split `s` on the first unescaped occurrence of `delim`.
fn split_unescaped_once(s: &str, delim: char) -> Option<(String, String)> {
    let mut current = String::new();
    let mut chars = s
        .chars()
        .peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                current.push(c);
                current.push(next);
                continue;
            }
        }
        if c == delim {
            let rest: String = chars.collect();
            return Some((current, rest));
        }
        current.push(c);
    }
    None
}

/// Escape a channel variable value: commas and single quotes are
/// backslash-escaped, and the whole value is wrapped in single quotes if it
/// contains a space.
fn escape_value(value: &str) -> String {
    let mut escaped = String::new();
    for ch in value.chars() {
        match ch {
            ',' => escaped.push_str("\\,"),
            '\'' => escaped.push_str("\\'"),
            _ => escaped.push(ch),
        }
    }
    if value.contains(' ') {
        format!("'{}'", escaped)
    } else {
        escaped
    }
}

/// Reverse of [`escape_value`]: strips an outer quote wrap, then resolves
/// backslash escapes.
fn unescape_value(raw: &str) -> String {
    let raw = if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        &raw[1..raw.len() - 1]
    } else {
        raw
    };

    let mut result = String::new();
    let mut chars = raw
        .chars()
        .peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                result.push(next);
                continue;
            }
        }
        result.push(c);
    }
    result
}

/// Scope for channel variables in an originate command.
///
/// - `Enterprise` (`<>`) — applies across all threads (`:_:` separated)
/// - `Default` (`{}`) — applies to all channels in this originate
/// - `Channel` (`[]`) — applies only to one specific channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariablesType {
    Enterprise,
    Default,
    Channel,
}

/// Ordered set of channel variables with FreeSWITCH escaping.
///
/// Values containing commas are escaped with `\,`, single quotes with `\'`,
/// and values with spaces are wrapped in single quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variables {
    pub vars_type: VariablesType,
    inner: IndexMap<String, String>,
}

impl Variables {
    pub fn new(vars_type: VariablesType) -> Self {
        Self {
            vars_type,
            inner: IndexMap::new(),
        }
    }

    pub fn with_vars(vars_type: VariablesType, vars: IndexMap<String, String>) -> Self {
        Self {
            vars_type,
            inner: vars,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.inner
            .insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner
            .get(key)
            .map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.inner
            .is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner
            .len()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, String> {
        self.inner
            .iter()
    }
}

impl fmt::Display for Variables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (open, close) = match self.vars_type {
            VariablesType::Enterprise => ('<', '>'),
            VariablesType::Default => ('{', '}'),
            VariablesType::Channel => ('[', ']'),
        };
        write!(f, "{}", open)?;
        for (i, (key, value)) in self
            .inner
            .iter()
            .enumerate()
        {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}={}", key, escape_value(value))?;
        }
        write!(f, "{}", close)
    }
}

impl FromStr for Variables {
    type Err = OriginateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (vars_type, inner) = match (s.chars().next(), s.chars().last()) {
            (Some('{'), Some('}')) => (VariablesType::Default, &s[1..s.len() - 1]),
            (Some('<'), Some('>')) => (VariablesType::Enterprise, &s[1..s.len() - 1]),
            (Some('['), Some(']')) => (VariablesType::Channel, &s[1..s.len() - 1]),
            _ => {
                return Err(OriginateError::ParseError(format!(
                    "invalid variable delimiters: {}",
                    s
                )))
            }
        };

        let mut vars = Variables::new(vars_type);
        for pair in split_unescaped(inner, ',') {
            let (key, value) = split_unescaped_once(&pair, '=').ok_or_else(|| {
                OriginateError::ParseError(format!("invalid variable pair: {}", pair))
            })?;
            vars.insert(key, unescape_value(&value));
        }
        Ok(vars)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Generic {
        uri: String,
        variables: Option<Variables>,
    },
    Loopback {
        uri: String,
        context: String,
        variables: Option<Variables>,
    },
    SofiaGateway {
        uri: String,
        gateway: String,
        variables: Option<Variables>,
    },
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vars = match self {
            Endpoint::Generic { variables, .. }
            | Endpoint::Loopback { variables, .. }
            | Endpoint::SofiaGateway { variables, .. } => variables,
        };
        if let Some(vars) = vars {
            write!(f, "{}", vars)?;
        }
        match self {
            Endpoint::Generic { uri, .. } => write!(f, "{}", uri),
            Endpoint::Loopback { uri, context, .. } => write!(f, "loopback/{}/{}", uri, context),
            Endpoint::SofiaGateway { uri, gateway, .. } => {
                write!(f, "sofia/gateway/{}/{}", gateway, uri)
            }
        }
    }
}

/// Split a leading `{...}`/`<...>`/`[...]` variables block from the front of
/// an endpoint string, respecting backslash-escaped delimiters.
fn split_leading_variables(s: &str) -> (Option<&str>, &str) {
    let Some(open) = s.chars().next() else {
        return (None, s);
    };
    let close = match open {
        '{' => '}',
        '<' => '>',
        '[' => ']',
        _ => return (None, s),
    };

    let mut iter = s.char_indices();
    iter.next();
    let mut escaped = false;
    for (idx, ch) in iter {
        if escaped {
            escaped = false;
            continue;
        }
        if ch == '\\' {
            escaped = true;
            continue;
        }
        if ch == close {
            let end = idx + ch.len_utf8();
            return (Some(&s[..end]), &s[end..]);
        }
    }
    (None, s)
}

impl FromStr for Endpoint {
    type Err = OriginateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (vars_str, rest) = split_leading_variables(s);
        let variables = vars_str
            .map(|v| v.parse())
            .transpose()?;

        if let Some(stripped) = rest.strip_prefix("sofia/gateway/") {
            let (gateway, uri) = stripped
                .split_once('/')
                .ok_or_else(|| {
                    OriginateError::ParseError(format!("invalid sofia gateway endpoint: {}", rest))
                })?;
            return Ok(Endpoint::SofiaGateway {
                uri: uri.to_string(),
                gateway: gateway.to_string(),
                variables,
            });
        }

        if let Some(stripped) = rest.strip_prefix("loopback/") {
            let (uri, context) = stripped
                .split_once('/')
                .ok_or_else(|| {
                    OriginateError::ParseError(format!("invalid loopback endpoint: {}", rest))
                })?;
            return Ok(Endpoint::Loopback {
                uri: uri.to_string(),
                context: context.to_string(),
                variables,
            });
        }

        Ok(Endpoint::Generic {
            uri: rest.to_string(),
            variables,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    pub name: String,
    pub args: Option<String>,
}

impl Application {
    pub fn new(name: impl Into<String>, args: Option<impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            args: args.map(|a| a.into()),
        }
    }

    pub fn to_string_with_dialplan(&self, dialplan: &DialplanType) -> String {
        match dialplan {
            DialplanType::Xml => format!(
                "&{}({})",
                self.name,
                self.args
                    .as_deref()
                    .unwrap_or("")
            ),
            DialplanType::Inline => match &self.args {
                Some(args) => format!("{}:{}", self.name, args),
                None => self
                    .name
                    .clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationList(pub Vec<Application>);

impl ApplicationList {
    pub fn to_string_with_dialplan(
        &self,
        dialplan: &DialplanType,
    ) -> Result<String, OriginateError> {
        match dialplan {
            DialplanType::Xml => {
                if self
                    .0
                    .len()
                    != 1
                {
                    return Err(OriginateError::TooManyApplications);
                }
                Ok(self.0[0].to_string_with_dialplan(dialplan))
            }
            DialplanType::Inline => Ok(self
                .0
                .iter()
                .map(|app| app.to_string_with_dialplan(dialplan))
                .collect::<Vec<_>>()
                .join(",")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Originate {
    pub endpoint: Endpoint,
    pub applications: ApplicationList,
    pub dialplan: Option<DialplanType>,
    pub context: Option<String>,
    pub cid_name: Option<String>,
    pub cid_num: Option<String>,
    pub timeout: Option<u32>,
}

impl fmt::Display for Originate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dialplan = self
            .dialplan
            .unwrap_or(DialplanType::Xml);
        let apps = self
            .applications
            .to_string_with_dialplan(&dialplan)
            .map_err(|_| fmt::Error)?;
        write!(f, "originate {} {}", self.endpoint, apps)?;
        if let Some(dialplan) = self.dialplan {
            write!(f, " {}", dialplan)?;
        }
        if let Some(context) = &self.context {
            write!(f, " {}", context)?;
        }
        if let Some(cid_name) = &self.cid_name {
            write!(f, " {}", cid_name)?;
        }
        if let Some(cid_num) = &self.cid_num {
            write!(f, " {}", cid_num)?;
        }
        if let Some(timeout) = self.timeout {
            write!(f, " {}", timeout)?;
        }
        Ok(())
    }
}

impl FromStr for Originate {
    type Err = OriginateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens = crate::commands::originate_split(s, ' ')?;
        let mut iter = tokens.into_iter();

        let keyword = iter
            .next()
            .ok_or_else(|| OriginateError::ParseError("empty originate command".into()))?;
        if keyword != "originate" {
            return Err(OriginateError::ParseError(format!(
                "expected 'originate', got '{}'",
                keyword
            )));
        }

        let endpoint_str = iter
            .next()
            .ok_or_else(|| OriginateError::ParseError("missing endpoint".into()))?;
        let endpoint: Endpoint = endpoint_str.parse()?;

        let app_str = iter
            .next()
            .ok_or_else(|| OriginateError::ParseError("missing application".into()))?;

        let remaining: Vec<String> = iter.collect();
        let dialplan = remaining
            .first()
            .map(|s| s.parse())
            .transpose()?;
        let context = remaining
            .get(1)
            .cloned();
        let cid_name = remaining
            .get(2)
            .cloned();
        let cid_num = remaining
            .get(3)
            .cloned();
        let timeout = remaining
            .get(4)
            .map(|s| {
                s.parse::<u32>()
                    .map_err(|_| OriginateError::ParseError(format!("invalid timeout: {}", s)))
            })
            .transpose()?;

        let applications = crate::commands::parse_application_list(&app_str, dialplan.as_ref())?;

        Ok(Self {
            endpoint,
            applications,
            dialplan,
            context,
            cid_name,
            cid_num,
            timeout,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OriginateError {
    #[error("unclosed quote at: {0}")]
    UnclosedQuote(String),
    #[error("too many applications for non-inline dialplan")]
    TooManyApplications,
    #[error("parse error: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- Variables ---

    #[test]
    fn variables_standard_chars() {
        let mut vars = Variables::new(VariablesType::Default);
        vars.insert("test_key", "this_value");
        let result = vars.to_string();
        assert!(result.contains("test_key"));
        assert!(result.contains("this_value"));
    }

    #[test]
    fn variables_comma_escaped() {
        let mut vars = Variables::new(VariablesType::Default);
        vars.insert("test_key", "this,is,a,value");
        let result = vars.to_string();
        assert!(result.contains("\\,"));
    }

    #[test]
    fn variables_spaces_quoted() {
        let mut vars = Variables::new(VariablesType::Default);
        vars.insert("test_key", "this is a value");
        let result = vars.to_string();
        assert_eq!(
            result
                .matches('\'')
                .count(),
            2
        );
    }

    #[test]
    fn variables_single_quote_escaped() {
        let mut vars = Variables::new(VariablesType::Default);
        vars.insert("test_key", "let's_this_be_a_value");
        let result = vars.to_string();
        assert!(result.contains("\\'"));
    }

    #[test]
    fn variables_enterprise_delimiters() {
        let mut vars = Variables::new(VariablesType::Enterprise);
        vars.insert("k", "v");
        let result = vars.to_string();
        assert!(result.starts_with('<'));
        assert!(result.ends_with('>'));
    }

    #[test]
    fn variables_channel_delimiters() {
        let mut vars = Variables::new(VariablesType::Channel);
        vars.insert("k", "v");
        let result = vars.to_string();
        assert!(result.starts_with('['));
        assert!(result.ends_with(']'));
    }

    #[test]
    fn variables_default_delimiters() {
        let mut vars = Variables::new(VariablesType::Default);
        vars.insert("k", "v");
        let result = vars.to_string();
        assert!(result.starts_with('{'));
        assert!(result.ends_with('}'));
    }

    #[test]
    fn variables_parse_round_trip() {
        let mut vars = Variables::new(VariablesType::Default);
        vars.insert("origination_caller_id_number", "9005551212");
        vars.insert("sip_h_Call-Info", "<url>;meta=123,<uri>");
        let s = vars.to_string();
        let parsed: Variables = s
            .parse()
            .unwrap();
        assert_eq!(
            parsed.get("origination_caller_id_number"),
            Some("9005551212")
        );
        assert_eq!(parsed.get("sip_h_Call-Info"), Some("<url>;meta=123,<uri>"));
    }

    // --- Endpoint ---

    #[test]
    fn endpoint_uri_only() {
        let ep = Endpoint::Generic {
            uri: "sofia/internal/123@cauca.ca".into(),
            variables: None,
        };
        assert_eq!(ep.to_string(), "sofia/internal/123@cauca.ca");
    }

    #[test]
    fn endpoint_uri_with_variable() {
        let mut vars = Variables::new(VariablesType::Default);
        vars.insert("one_variable", "1");
        let ep = Endpoint::Generic {
            uri: "sofia/internal/123@cauca.ca".into(),
            variables: Some(vars),
        };
        assert_eq!(
            ep.to_string(),
            "{one_variable=1}sofia/internal/123@cauca.ca"
        );
    }

    #[test]
    fn endpoint_variable_with_quote() {
        let mut vars = Variables::new(VariablesType::Default);
        vars.insert("one_variable", "one'quote");
        let ep = Endpoint::Generic {
            uri: "sofia/internal/123@cauca.ca".into(),
            variables: Some(vars),
        };
        assert_eq!(
            ep.to_string(),
            "{one_variable=one\\'quote}sofia/internal/123@cauca.ca"
        );
    }

    #[test]
    fn loopback_endpoint_display() {
        let mut vars = Variables::new(VariablesType::Default);
        vars.insert("one_variable", "1");
        let ep = Endpoint::Loopback {
            uri: "aUri".into(),
            context: "aContext".into(),
            variables: Some(vars),
        };
        assert_eq!(ep.to_string(), "{one_variable=1}loopback/aUri/aContext");
    }

    #[test]
    fn sofia_gateway_endpoint_display() {
        let mut vars = Variables::new(VariablesType::Default);
        vars.insert("one_variable", "1");
        let ep = Endpoint::SofiaGateway {
            uri: "aUri".into(),
            gateway: "internal".into(),
            variables: Some(vars),
        };
        assert_eq!(
            ep.to_string(),
            "{one_variable=1}sofia/gateway/internal/aUri"
        );
    }

    // --- Application ---

    #[test]
    fn application_xml_format() {
        let app = Application::new("testApp", Some("testArg"));
        assert_eq!(
            app.to_string_with_dialplan(&DialplanType::Xml),
            "&testApp(testArg)"
        );
    }

    #[test]
    fn application_inline_format() {
        let app = Application::new("testApp", Some("testArg"));
        assert_eq!(
            app.to_string_with_dialplan(&DialplanType::Inline),
            "testApp:testArg"
        );
    }

    // --- ApplicationList ---

    #[test]
    fn application_list_single_xml() {
        let list = ApplicationList(vec![Application::new("testApp1", Some("testArg1"))]);
        assert_eq!(
            list.to_string_with_dialplan(&DialplanType::Xml)
                .unwrap(),
            "&testApp1(testArg1)"
        );
    }

    #[test]
    fn application_list_single_inline() {
        let list = ApplicationList(vec![Application::new("testApp1", Some("testArg1"))]);
        assert_eq!(
            list.to_string_with_dialplan(&DialplanType::Inline)
                .unwrap(),
            "testApp1:testArg1"
        );
    }

    #[test]
    fn application_list_two_xml_errors() {
        let list = ApplicationList(vec![
            Application::new("testApp1", Some("testArg1")),
            Application::new("testApp2", Some("testArg2")),
        ]);
        assert!(list
            .to_string_with_dialplan(&DialplanType::Xml)
            .is_err());
    }

    #[test]
    fn application_list_two_inline() {
        let list = ApplicationList(vec![
            Application::new("testApp1", Some("testArg1")),
            Application::new("testApp2", Some("testArg2")),
        ]);
        assert_eq!(
            list.to_string_with_dialplan(&DialplanType::Inline)
                .unwrap(),
            "testApp1:testArg1,testApp2:testArg2"
        );
    }

    // --- Originate ---

    #[test]
    fn originate_xml_display() {
        let ep = Endpoint::Generic {
            uri: "sofia/internal/123@cauca.ca".into(),
            variables: None,
        };
        let apps = ApplicationList(vec![Application::new("conference", Some("1"))]);
        let orig = Originate {
            endpoint: ep,
            applications: apps,
            dialplan: Some(DialplanType::Xml),
            context: None,
            cid_name: None,
            cid_num: None,
            timeout: None,
        };
        assert_eq!(
            orig.to_string(),
            "originate sofia/internal/123@cauca.ca &conference(1) XML"
        );
    }

    #[test]
    fn originate_inline_display() {
        let ep = Endpoint::Generic {
            uri: "sofia/internal/123@cauca.ca".into(),
            variables: None,
        };
        let apps = ApplicationList(vec![Application::new("conference", Some("1"))]);
        let orig = Originate {
            endpoint: ep,
            applications: apps,
            dialplan: Some(DialplanType::Inline),
            context: None,
            cid_name: None,
            cid_num: None,
            timeout: None,
        };
        assert_eq!(
            orig.to_string(),
            "originate sofia/internal/123@cauca.ca conference:1 inline"
        );
    }

    #[test]
    fn originate_from_string_round_trip() {
        let input = "originate {test='variable with quote'}sofia/test 123";
        let orig: Originate = input
            .parse()
            .unwrap();
        assert!(orig
            .endpoint
            .to_string()
            .contains("sofia/test"));
    }

    #[test]
    fn originate_display_round_trip() {
        let ep = Endpoint::Generic {
            uri: "sofia/internal/123@cauca.ca".into(),
            variables: None,
        };
        let apps = ApplicationList(vec![Application::new("conference", Some("1"))]);
        let orig = Originate {
            endpoint: ep,
            applications: apps,
            dialplan: Some(DialplanType::Xml),
            context: None,
            cid_name: None,
            cid_num: None,
            timeout: None,
        };
        let s = orig.to_string();
        let parsed: Originate = s
            .parse()
            .unwrap();
        assert_eq!(parsed.to_string(), s);
    }

    // --- DialplanType ---

    #[test]
    fn dialplan_type_display() {
        assert_eq!(DialplanType::Inline.to_string(), "inline");
        assert_eq!(DialplanType::Xml.to_string(), "XML");
    }

    #[test]
    fn dialplan_type_from_str() {
        assert_eq!(
            "inline"
                .parse::<DialplanType>()
                .unwrap(),
            DialplanType::Inline
        );
        assert_eq!(
            "XML"
                .parse::<DialplanType>()
                .unwrap(),
            DialplanType::Xml
        );
    }
}
