use crate::FunctionError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub type FunctionId = i64;

/// Settings key under which the function source is stored
pub const CODE_KEY: &str = "code";

/// A registered function definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    /// Assigned by the store; 0 until registered
    #[serde(default)]
    pub id: FunctionId,
    pub name: String,
    pub route: String,
    pub language: Language,
    /// Per-execution wall clock limit in seconds
    #[serde(rename = "timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub runtime: RuntimeKind,
    /// Free-form settings; source code lives under the "code" key
    #[serde(default)]
    pub settings: HashMap<String, String>,
}

impl Function {
    pub fn new(name: impl Into<String>, route: impl Into<String>, language: Language) -> Self {
        Self {
            id: 0,
            name: name.into(),
            route: route.into(),
            language,
            timeout_secs: 30,
            runtime: RuntimeKind::default(),
            settings: HashMap::new(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.settings.insert(CODE_KEY.to_string(), code.into());
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_secs = seconds;
        self
    }

    pub fn with_runtime(mut self, runtime: RuntimeKind) -> Self {
        self.runtime = runtime;
        self
    }

    /// Source code, if any was provided
    pub fn code(&self) -> Option<&str> {
        self.settings.get(CODE_KEY).map(String::as_str)
    }

    /// Check structural validity before the definition is stored
    pub fn validate(&self) -> Result<(), FunctionError> {
        if self.name.trim().is_empty() {
            return Err(FunctionError::Invalid("name must not be empty".into()));
        }
        if !self.route.starts_with('/') {
            return Err(FunctionError::Invalid(format!(
                "route must start with '/': {}",
                self.route
            )));
        }
        if self.timeout_secs == 0 {
            return Err(FunctionError::Invalid("timeout must be at least 1s".into()));
        }
        Ok(())
    }
}

/// Source language of a function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Node,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::Python, Language::Node];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Node => "node",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = FunctionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "python" => Ok(Language::Python),
            "node" => Ok(Language::Node),
            other => Err(FunctionError::Invalid(format!(
                "unsupported language: {other}"
            ))),
        }
    }
}

/// Container runtime the function executes under
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    /// Default OCI runtime
    #[default]
    Runc,
    /// gVisor sandbox
    Runsc,
}

impl RuntimeKind {
    pub const ALL: [RuntimeKind; 2] = [RuntimeKind::Runc, RuntimeKind::Runsc];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeKind::Runc => "runc",
            RuntimeKind::Runsc => "runsc",
        }
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuntimeKind {
    type Err = FunctionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "runc" => Ok(RuntimeKind::Runc),
            "runsc" => Ok(RuntimeKind::Runsc),
            other => Err(FunctionError::Invalid(format!(
                "unsupported runtime: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_stores_code_in_settings() {
        let f = Function::new("hello", "/hello", Language::Python).with_code("print('hi')");
        assert_eq!(f.code(), Some("print('hi')"));
        assert_eq!(f.settings.get("code").map(String::as_str), Some("print('hi')"));
    }

    #[test]
    fn validate_rejects_bad_route() {
        let f = Function::new("hello", "hello", Language::Python);
        assert!(f.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let f = Function::new("hello", "/hello", Language::Node).with_timeout(0);
        assert!(f.validate().is_err());
    }

    #[test]
    fn wire_form_is_lowercase() {
        let f = Function::new("hello", "/hello", Language::Node).with_runtime(RuntimeKind::Runsc);
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["language"], "node");
        assert_eq!(json["runtime"], "runsc");
        assert_eq!(json["timeout"], 30);
    }

    #[test]
    fn runtime_defaults_to_runc() {
        let f: Function = serde_json::from_str(
            r#"{"name":"f","route":"/f","language":"python","timeout":5}"#,
        )
        .unwrap();
        assert_eq!(f.runtime, RuntimeKind::Runc);
        assert!(f.settings.is_empty());
    }

    #[test]
    fn unknown_language_is_rejected() {
        let res: Result<Function, _> = serde_json::from_str(
            r#"{"name":"f","route":"/f","language":"ruby","timeout":5}"#,
        );
        assert!(res.is_err());
    }
}
