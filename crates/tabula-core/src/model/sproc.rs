use serde::{Deserialize, Serialize};
use std::fmt;

///
/// ParameterDirection
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum ParameterDirection {
    In,
    Out,
    InOut,
    Return,
}

impl ParameterDirection {
    #[must_use]
    pub const fn is_input(self) -> bool {
        matches!(self, Self::In | Self::InOut)
    }

    #[must_use]
    pub const fn is_output(self) -> bool {
        matches!(self, Self::Out | Self::InOut | Self::Return)
    }
}

///
/// QueryParameter
///
/// Logical parameter descriptor handed to the parameter factory.
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryParameter {
    pub name: String,
    pub type_tag: String,
    pub direction: ParameterDirection,
    pub ordinal: u32,
}

impl QueryParameter {
    #[must_use]
    pub fn input(name: impl Into<String>, type_tag: impl Into<String>, ordinal: u32) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
            direction: ParameterDirection::In,
            ordinal,
        }
    }
}

///
/// SprocName
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SprocName {
    pub owner: String,
    pub package: String,
    pub name: String,
}

impl SprocName {
    #[must_use]
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            package: String::new(),
            name: name.into(),
        }
    }
}

impl fmt::Display for SprocName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in [&self.owner, &self.package] {
            if !part.is_empty() {
                write!(f, "{part}.")?;
            }
        }
        f.write_str(&self.name)
    }
}

///
/// SprocDefinition
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SprocDefinition {
    pub name: SprocName,
    pub params: Vec<QueryParameter>,
}

impl SprocDefinition {
    /// Input parameters ordered by ordinal.
    #[must_use]
    pub fn inputs(&self) -> Vec<&QueryParameter> {
        let mut inputs: Vec<_> = self
            .params
            .iter()
            .filter(|param| param.direction.is_input())
            .collect();
        inputs.sort_by_key(|param| param.ordinal);
        inputs
    }

    /// Output parameters ordered by ordinal.
    #[must_use]
    pub fn outputs(&self) -> Vec<&QueryParameter> {
        let mut outputs: Vec<_> = self
            .params
            .iter()
            .filter(|param| param.direction.is_output())
            .collect();
        outputs.sort_by_key(|param| param.ordinal);
        outputs
    }
}

///
/// Sproc
///
/// Nested stored-procedure descriptor as discovered: a named root holding
/// packages or definitions.
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Sproc {
    Root(String, Box<Self>),
    Package(String, Vec<SprocDefinition>),
    Definition(SprocDefinition),
    Empty,
}

impl Sproc {
    /// Identity name derived by walking the nesting down to its leaf.
    ///
    /// Roots and packages contribute a dotted prefix; `Empty` has no name.
    #[must_use]
    pub fn name(&self) -> String {
        let mut parts = Vec::new();
        let mut node = self;

        loop {
            match node {
                Self::Root(name, inner) => {
                    parts.push(name.clone());
                    node = inner;
                }
                Self::Package(name, _) => {
                    parts.push(name.clone());
                    break;
                }
                Self::Definition(def) => {
                    parts.push(def.name.to_string());
                    break;
                }
                Self::Empty => break,
            }
        }

        parts.join(".")
    }

    /// All definitions reachable from this node.
    #[must_use]
    pub fn definitions(&self) -> Vec<&SprocDefinition> {
        match self {
            Self::Root(_, inner) => inner.definitions(),
            Self::Package(_, defs) => defs.iter().collect(),
            Self::Definition(def) => vec![def],
            Self::Empty => Vec::new(),
        }
    }
}
