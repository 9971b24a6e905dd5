//! Builder helpers: synthesize new functions, classes, and methods
//!
//! Builders produce syntactically complete element fragments in the target
//! family's shape; the manipulation engine normalizes indentation when the
//! fragment is inserted.

use crate::lang::LangFamily;

/// Structured description of one parameter
#[derive(Debug, Clone, Default)]
pub struct ParameterSpec {
    pub name: String,
    pub value_type: Option<String>,
    pub default_value: Option<String>,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn typed(name: impl Into<String>, value_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_type: Some(value_type.into()),
            default_value: None,
        }
    }

    fn render(&self, family: LangFamily) -> String {
        let mut out = self.name.clone();
        if let Some(value_type) = &self.value_type {
            out.push_str(": ");
            out.push_str(value_type);
        }
        if let Some(default) = &self.default_value {
            match family {
                LangFamily::Indent if self.value_type.is_some() => {
                    out.push_str(" = ");
                    out.push_str(default);
                }
                LangFamily::Indent => {
                    out.push('=');
                    out.push_str(default);
                }
                LangFamily::Brace => {
                    out.push_str(" = ");
                    out.push_str(default);
                }
            }
        }
        out
    }
}

/// Structured description of a function or method
#[derive(Debug, Clone, Default)]
pub struct FunctionSpec {
    pub name: String,
    pub parameters: Vec<ParameterSpec>,
    pub return_type: Option<String>,
    pub body_lines: Vec<String>,
    pub decorators: Vec<String>,
}

impl FunctionSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn returns(mut self, return_type: impl Into<String>) -> Self {
        self.return_type = Some(return_type.into());
        self
    }

    pub fn body_line(mut self, line: impl Into<String>) -> Self {
        self.body_lines.push(line.into());
        self
    }

    pub fn decorator(mut self, decorator: impl Into<String>) -> Self {
        self.decorators.push(decorator.into());
        self
    }

    /// Render as a free function fragment
    pub fn render(&self, family: LangFamily) -> String {
        self.render_callable(family, false)
    }

    /// Render as a class member fragment. In the indent family a `self`
    /// receiver is prepended when missing.
    pub fn render_method(&self, family: LangFamily) -> String {
        self.render_callable(family, true)
    }

    fn render_callable(&self, family: LangFamily, as_method: bool) -> String {
        let mut params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| p.render(family))
            .collect();
        if as_method
            && family == LangFamily::Indent
            && self.parameters.first().map(|p| p.name.as_str()) != Some("self")
        {
            params.insert(0, "self".to_string());
        }
        let params = params.join(", ");

        let mut lines: Vec<String> = self
            .decorators
            .iter()
            .map(|d| format!("@{}", d.trim_start_matches('@')))
            .collect();

        match family {
            LangFamily::Indent => {
                let ret = self
                    .return_type
                    .as_deref()
                    .map(|r| format!(" -> {}", r))
                    .unwrap_or_default();
                lines.push(format!("def {}({}){}:", self.name, params, ret));
                if self.body_lines.is_empty() {
                    lines.push("    pass".to_string());
                } else {
                    for line in &self.body_lines {
                        lines.push(format!("    {}", line));
                    }
                }
            }
            LangFamily::Brace => {
                let ret = self
                    .return_type
                    .as_deref()
                    .map(|r| format!(": {}", r))
                    .unwrap_or_default();
                let keyword = if as_method { "" } else { "function " };
                lines.push(format!("{}{}({}){} {{", keyword, self.name, params, ret));
                for line in &self.body_lines {
                    lines.push(format!("    {}", line));
                }
                lines.push("}".to_string());
            }
        }

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

/// Structured description of a class
#[derive(Debug, Clone, Default)]
pub struct ClassSpec {
    pub name: String,
    pub bases: Vec<String>,
    pub decorators: Vec<String>,
    pub methods: Vec<FunctionSpec>,
}

impl ClassSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.bases.push(base.into());
        self
    }

    pub fn method(mut self, method: FunctionSpec) -> Self {
        self.methods.push(method);
        self
    }

    /// Render as a complete class fragment
    pub fn render(&self, family: LangFamily) -> String {
        let mut lines: Vec<String> = self
            .decorators
            .iter()
            .map(|d| format!("@{}", d.trim_start_matches('@')))
            .collect();

        match family {
            LangFamily::Indent => {
                let bases = if self.bases.is_empty() {
                    String::new()
                } else {
                    format!("({})", self.bases.join(", "))
                };
                lines.push(format!("class {}{}:", self.name, bases));
                if self.methods.is_empty() {
                    lines.push("    pass".to_string());
                }
                for (i, method) in self.methods.iter().enumerate() {
                    if i > 0 {
                        lines.push(String::new());
                    }
                    for line in method.render_method(family).trim_end().lines() {
                        if line.is_empty() {
                            lines.push(String::new());
                        } else {
                            lines.push(format!("    {}", line));
                        }
                    }
                }
            }
            LangFamily::Brace => {
                let bases = self
                    .bases
                    .first()
                    .map(|b| format!(" extends {}", b))
                    .unwrap_or_default();
                lines.push(format!("class {}{} {{", self.name, bases));
                for method in &self.methods {
                    for line in method.render_method(family).trim_end().lines() {
                        if line.is_empty() {
                            lines.push(String::new());
                        } else {
                            lines.push(format!("    {}", line));
                        }
                    }
                }
                lines.push("}".to_string());
            }
        }

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}
