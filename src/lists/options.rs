use crate::error::FormatError;

/// Values available to a list entry's pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    /// 1-based position in the list
    Number,
    Name,
    Id,
}

impl Variable {
    pub const ALL: [Variable; 3] = [Variable::Number, Variable::Name, Variable::Id];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variable::Number => "number",
            Variable::Name => "name",
            Variable::Id => "id",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    /// Placed between entries
    pub delimiter: String,
    /// printf-style pattern with three `%s`/`%d`/`%i` slots; `%%` is a literal `%`
    pub pattern: String,
    /// Which variable fills each pattern slot
    pub variable_order: Vec<Variable>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            delimiter: "\n".to_string(),
            pattern: "%i. %s [%s]".to_string(),
            variable_order: Variable::ALL.to_vec(),
        }
    }
}

impl ListOptions {
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn with_variable_order(mut self, order: impl Into<Vec<Variable>>) -> Self {
        self.variable_order = order.into();
        self
    }

    /// Check the variable order names each variable exactly once
    pub fn validate_order(&self) -> Result<(), FormatError> {
        for (i, variable) in self.variable_order.iter().enumerate() {
            if self.variable_order[..i].contains(variable) {
                return Err(FormatError::DuplicateVariable(variable.as_str()));
            }
        }
        match Variable::ALL
            .iter()
            .find(|variable| !self.variable_order.contains(variable))
        {
            Some(missing) => Err(FormatError::MissingVariable(missing.as_str())),
            None => Ok(()),
        }
    }
}
