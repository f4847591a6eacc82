//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging (for example)
//! a [`TaskId`] with a [`WorkerId`] even though both are `String` under the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty
            /// or only whitespace.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.trim().is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value).ok_or_else(|| {
                    format!("{} must not be empty", stringify!($name))
                })
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single pipeline run (one call to `PipelineRunner::run`).
///
/// Generated fresh for every run; propagated through spans so all activity
/// from a single run can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed (configuration names)
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies a task within a pipeline.
    ///
    /// Task identifiers are unique per pipeline and are the keys predecessors
    /// refer to.
    TaskId
}

string_id! {
    /// Identifies a worker (a role-bound backend invoker) within a pipeline.
    WorkerId
}

string_id! {
    /// Identifies a named pipeline (crew) definition, e.g. `"mvp"`.
    PipelineName
}

string_id! {
    /// Identifies a tool capability exposed to workers (e.g. `"write_artifact"`).
    ToolName
}

impl ToolName {
    /// Wraps a tool name fixed at compile time.
    ///
    /// The literal is not checked here; declare it next to a `const`
    /// assertion that it is non-blank, as the built-in tools do.
    pub fn from_static(name: &'static str) -> Self {
        Self(name.to_owned())
    }
}

string_id! {
    /// Identifies one tool invocation within a worker turn.
    ///
    /// Assigned by the backend; used to dedupe repeated requests for the same
    /// call so a side effect is never executed twice.
    ToolCallId
}

string_id! {
    /// Names a persisted artifact, relative to the run's working directory
    /// (e.g. `"architecture.md"`).
    ArtifactName
}
